// src/server/mod.rs

//! Development server: static files plus a live-reload event channel.
//!
//! Every HTML response gets a small client script injected before
//! `</body>`. The script subscribes to `/__assetflow/events` (server-sent
//! events) and either reloads the page or swaps stylesheets in place.

pub mod notifier;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_stream::stream;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerSection;

pub use notifier::{ChangeSet, ReloadEvent, ReloadNotifier};

pub const EVENTS_PATH: &str = "/__assetflow/events";
pub const CLIENT_PATH: &str = "/__assetflow/client.js";

const CLIENT_JS: &str = include_str!("client.js");

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory served at `/`.
    pub root: PathBuf,
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    pub inject_changes: bool,
    /// Show a small in-page notice on every reload/inject.
    pub notify: bool,
    /// Open the site in the default browser once listening.
    pub open: bool,
}

impl ServerOptions {
    pub fn from_section(section: &ServerSection, project_root: &Path) -> Self {
        Self {
            root: project_root.join(&section.root),
            host: section.host.clone(),
            port: section.port,
            inject_changes: section.inject_changes,
            notify: section.notify,
            open: section.open,
        }
    }
}

#[derive(Clone)]
struct AppState {
    root: Arc<PathBuf>,
    notifier: ReloadNotifier,
    notify: bool,
    shutdown: watch::Receiver<bool>,
}

/// A running dev server.
#[derive(Debug)]
pub struct DevServer {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DevServer {
    /// Bind and start serving in the background.
    pub async fn serve(options: ServerOptions, notifier: ReloadNotifier) -> Result<Self> {
        let listener = TcpListener::bind((options.host.as_str(), options.port))
            .await
            .with_context(|| format!("binding dev server to {}:{}", options.host, options.port))?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState {
            root: Arc::new(options.root.clone()),
            notifier,
            notify: options.notify,
            shutdown: shutdown_rx.clone(),
        };

        let app = Router::new()
            .route(EVENTS_PATH, get(stream_events))
            .route(CLIENT_PATH, get(client_script))
            .fallback(static_file)
            .with_state(state);

        let mut signal = shutdown_rx;
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(err) = result {
                error!(error = %err, "dev server terminated with error");
            }
        });

        let server = Self {
            addr,
            shutdown_tx,
            handle,
        };
        info!(root = ?options.root, "dev server listening on {}", server.url());

        if options.open {
            open_browser(&server.url());
        }
        Ok(server)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Stop accepting connections, close event streams and wait for the
    /// server task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.await.context("dev server task panicked")?;
        info!("dev server stopped");
        Ok(())
    }
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.notifier.subscribe();
    let mut shutdown = state.shutdown.clone();
    debug!(clients = state.notifier.client_count(), "browser connected to event stream");

    let event_stream = stream! {
        loop {
            let received = tokio::select! {
                received = rx.recv() => received,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            match received {
                Ok(event) => yield Ok(to_sse(&event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event stream lagged; forcing reload");
                    yield Ok(to_sse(&ReloadEvent::Reload));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

fn to_sse(event: &ReloadEvent) -> SseEvent {
    let data = match event {
        ReloadEvent::Reload => String::new(),
        ReloadEvent::Inject { paths } => {
            serde_json::to_string(paths).unwrap_or_else(|_| "[]".to_string())
        }
    };
    SseEvent::default().event(event.name()).data(data)
}

async fn client_script(State(state): State<AppState>) -> Response {
    let body = format!("window.__assetflowNotify = {};\n{CLIENT_JS}", state.notify);
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn static_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(rel) = sanitize_path(uri.path()) else {
        debug!(path = uri.path(), "rejected request path");
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut path = state.root.join(rel);
    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path = path.join("index.html");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!(?path, "not found");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = content_type_for(&path);
    let body = if content_type.starts_with("text/html") {
        inject_client_tag(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Decode a request path into a relative filesystem path.
///
/// Returns `None` for any path that would leave the served root.
pub fn sanitize_path(raw: &str) -> Option<PathBuf> {
    let decoded = percent_decode(raw)?;
    let mut out = PathBuf::new();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        let part = Path::new(segment);
        if !matches!(part.components().next(), Some(Component::Normal(_))) {
            return None;
        }
        out.push(segment);
    }
    Some(out)
}

fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Insert the client script tag before the last `</body>`, or append it.
pub fn inject_client_tag(html: &str) -> String {
    let tag = format!("<script src=\"{CLIENT_PATH}\"></script>");
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => format!("{}{tag}\n{}", &html[..idx], &html[idx..]),
        None => format!("{html}{tag}\n"),
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}

/// Open `url` with the platform's default browser.
fn open_browser(url: &str) {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(windows) {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };

    match command.arg(url).spawn() {
        Ok(_) => debug!(%url, "opened browser"),
        Err(err) => warn!(%url, error = %err, "failed to open browser"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(sanitize_path("/../secret"), None);
        assert_eq!(sanitize_path("/css/%2e%2e/%2e%2e/etc/passwd"), None);
        assert_eq!(sanitize_path("/css/style.css"), Some(PathBuf::from("css/style.css")));
        assert_eq!(sanitize_path("/"), Some(PathBuf::new()));
        assert_eq!(sanitize_path("/my%20page.html"), Some(PathBuf::from("my page.html")));
    }

    #[test]
    fn client_tag_goes_before_body_close() {
        let html = inject_client_tag("<html><BODY><p>x</p></BODY></html>");
        assert_eq!(
            html,
            "<html><BODY><p>x</p><script src=\"/__assetflow/client.js\"></script>\n</BODY></html>"
        );
        assert!(inject_client_tag("<p>x</p>").ends_with("</script>\n"));
    }
}
