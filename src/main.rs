//! camwatch entry point: parse the CLI, wire up the capture source and
//! artifact store, and serve the browser UI.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use camwatch::capture::{CameraSource, CaptureConfig, DirectCapture, FrameSource, StreamCapture};
use camwatch::logging;
use camwatch::store::ArtifactStore;
use camwatch::web::{self, AppState};

/// Local camera monitor with a browser UI
#[derive(Parser, Debug)]
#[command(name = "camwatch")]
#[command(author, version, about)]
struct Args {
    /// Camera device index or stream URL
    #[arg(short = 'c', long, default_value = "0")]
    camera_source: String,

    /// Listening host
    #[arg(short = 's', long, default_value = "0.0.0.0")]
    host: String,

    /// Listening port
    #[arg(short = 'p', long, default_value_t = 7860)]
    port: u16,

    /// Read a frame from the device on every request instead of keeping a
    /// background stream running
    #[arg(long)]
    on_demand: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _logging_guards = logging::init_logging(Path::new("logs"));

    let camera = CameraSource::parse(&args.camera_source);
    let store = ArtifactStore::new(".")?;

    let source: Box<dyn FrameSource> = if args.on_demand {
        let mut direct = DirectCapture::new(camera.clone());
        // An unusable device means there is nothing to serve; probe it now
        // and fail fast rather than erroring on every request.
        direct.capture()?;
        Box::new(direct)
    } else {
        let mut stream = StreamCapture::new(camera.clone(), CaptureConfig::default());
        stream.start();
        Box::new(stream)
    };

    let bind: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let state = Arc::new(AppState::new(source, store));

    info!("Capturing from {} ({} mode)", camera, if args.on_demand { "on-demand" } else { "streaming" });

    let result = web::serve(state.clone(), bind).await;

    state.release_source();
    info!("Capture source released, exiting");

    result.map_err(Into::into)
}
