//! camwatch — local camera monitor with a browser UI.
//!
//! Exposes a webcam or network video stream over HTTP: live view,
//! screenshot capture, and zip-archive management of the saved frames.

pub mod capture;
pub mod logging;
pub mod store;
pub mod web;
