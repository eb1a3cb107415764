//! HTTP endpoint serving the latest artifact of each stream.
//!
//! The server only reads files the streams have already published; a
//! request never triggers a render.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::scheduler::Stream;
use crate::error::StreamError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A stream exposed at an HTTP path such as `/cam1.png`.
#[derive(Debug, Clone)]
pub struct SnapshotRoute {
    pub route: String,
    pub stream: Stream,
}

impl SnapshotRoute {
    pub fn new(route: impl Into<String>, stream: Stream) -> Self {
        Self {
            route: route.into(),
            stream,
        }
    }
}

/// A running snapshot server and the streams it owns.
pub struct SnapshotServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
    streams: Vec<Stream>,
}

impl SnapshotServer {
    /// Start every stream, bind `addr` and serve in the background.
    pub async fn start(addr: &str, routes: Vec<SnapshotRoute>) -> Result<Self, StreamError> {
        validate_routes(&routes)?;

        let streams: Vec<Stream> = routes.iter().map(|r| r.stream.clone()).collect();
        for stream in &streams {
            if let Err(e) = stream.start() {
                streams.iter().for_each(Stream::stop);
                return Err(e);
            }
        }

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                streams.iter().for_each(Stream::stop);
                return Err(StreamError::Bind {
                    addr: addr.to_string(),
                    message: e.to_string(),
                });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                streams.iter().for_each(Stream::stop);
                return Err(e.into());
            }
        };

        let app = router(&routes);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            "Snapshot server listening on http://{local_addr} ({} routes)",
            routes.len()
        );
        Ok(Self {
            local_addr,
            shutdown_tx,
            task,
            streams,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Stop the streams and the listener, waiting up to five seconds for
    /// open requests to finish.
    pub async fn shutdown(self) {
        self.streams.iter().for_each(Stream::stop);
        let _ = self.shutdown_tx.send(());

        let mut task = self.task;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => tracing::info!("Snapshot server stopped"),
            Ok(Ok(Err(e))) => tracing::error!("Snapshot server failed: {e}"),
            Ok(Err(e)) => tracing::error!("Snapshot server task panicked: {e}"),
            Err(_) => {
                tracing::warn!("Snapshot server did not stop within {SHUTDOWN_TIMEOUT:?}, aborting");
                task.abort();
            }
        }
    }
}

/// Build the router with one `GET` handler per route.
pub fn router(routes: &[SnapshotRoute]) -> Router {
    routes.iter().fold(Router::new(), |router, r| {
        let stream = r.stream.clone();
        router.route(&r.route, get(move || latest_artifact(stream.clone())))
    })
}

async fn latest_artifact(stream: Stream) -> Response {
    match tokio::fs::read(stream.artifact_path()).await {
        Ok(bytes) if !bytes.is_empty() => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
                (header::PRAGMA, "no-cache"),
                (header::EXPIRES, "0"),
            ],
            bytes,
        )
            .into_response(),
        _ => (StatusCode::NOT_FOUND, "no image available").into_response(),
    }
}

fn validate_routes(routes: &[SnapshotRoute]) -> Result<(), StreamError> {
    let mut seen = HashSet::new();
    for r in routes {
        let invalid = |reason: &str| StreamError::InvalidRoute(r.route.clone(), reason.to_string());
        if !r.route.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if r.route.contains(['{', '}', '*']) || r.route.split('/').any(|s| s.starts_with(':')) {
            return Err(invalid("must be a literal path"));
        }
        if !seen.insert(r.route.as_str()) {
            return Err(invalid("used twice"));
        }
    }
    Ok(())
}
