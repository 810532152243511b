//! Inline single-page UI served at `/`.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>camwatch</title>
<style>
  body { font-family: sans-serif; margin: 1.5rem; background: #16161e; color: #c8c8d4; }
  h1 { font-size: 1.3rem; }
  h2 { font-size: 1rem; margin-bottom: 0.3rem; }
  .columns { display: flex; gap: 2rem; flex-wrap: wrap; }
  .panel { flex: 1; min-width: 340px; }
  img#live { width: 100%; max-width: 640px; background: #000; border-radius: 4px; min-height: 240px; }
  button { margin: 0.2rem 0.3rem 0.2rem 0; padding: 0.4rem 0.8rem; border: none; border-radius: 4px;
           background: #3d59a1; color: #fff; cursor: pointer; }
  button.danger { background: #8c4351; }
  pre { background: #1f1f2b; padding: 0.6rem; border-radius: 4px; min-height: 6rem;
        white-space: pre-wrap; font-size: 0.85rem; }
  .status { color: #9ece6a; font-size: 0.85rem; min-height: 1.2rem; }
</style>
</head>
<body>
<h1>camwatch</h1>
<div class="columns">
  <div class="panel">
    <img id="live" alt="camera feed">
    <div>
      <button onclick="refreshFrame()">Refresh</button>
      <button id="autoBtn" onclick="toggleAuto()">Auto refresh (1s)</button>
      <button onclick="takeScreenshot()">Screenshot</button>
    </div>
    <div class="status" id="captureStatus"></div>
  </div>
  <div class="panel">
    <h2>Screenshots</h2>
    <pre id="screenshotList">loading...</pre>
    <button onclick="createArchive()">Create archive</button>
    <button class="danger" onclick="clearScreenshots()">Clear all</button>
    <h2>Archives</h2>
    <pre id="archiveList">loading...</pre>
    <button onclick="bundleArchives()">Bundle all archives</button>
    <button class="danger" onclick="clearArchives()">Clear all</button>
    <div class="status" id="storeStatus"></div>
  </div>
</div>
<script>
let autoTimer = null;

function setStatus(id, text) {
  document.getElementById(id).textContent = text;
}

function refreshFrame() {
  document.getElementById('live').src = '/api/frame?ts=' + Date.now();
}

async function toggleAuto() {
  const res = await fetch('/api/auto-refresh', { method: 'POST' });
  const body = await res.json();
  setStatus('captureStatus', body.status);
  if (body.enabled && !autoTimer) {
    autoTimer = setInterval(refreshFrame, 1000);
  } else if (!body.enabled && autoTimer) {
    clearInterval(autoTimer);
    autoTimer = null;
  }
}

async function refreshLists() {
  const [shots, archives] = await Promise.all([
    fetch('/api/screenshots').then(r => r.json()),
    fetch('/api/archives').then(r => r.json()),
  ]);
  setStatus('screenshotList', shots.formatted);
  setStatus('archiveList', archives.formatted);
}

async function takeScreenshot() {
  const res = await fetch('/api/screenshots', { method: 'POST' });
  const body = await res.json();
  setStatus('captureStatus', body.status);
  refreshFrame();
  refreshLists();
}

async function createArchive() {
  const res = await fetch('/api/archives', { method: 'POST' });
  setStatus('storeStatus', (await res.json()).status);
  refreshLists();
}

async function bundleArchives() {
  const res = await fetch('/api/archives/bundle', { method: 'POST' });
  setStatus('storeStatus', (await res.json()).status);
}

async function clearScreenshots() {
  const res = await fetch('/api/screenshots', { method: 'DELETE' });
  setStatus('storeStatus', (await res.json()).status);
  refreshLists();
}

async function clearArchives() {
  const res = await fetch('/api/archives', { method: 'DELETE' });
  setStatus('storeStatus', (await res.json()).status);
  refreshLists();
}

refreshFrame();
refreshLists();
</script>
</body>
</html>
"#;
