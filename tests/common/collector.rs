//! Local collector server
//!
//! Accepts `POST /bugs` the way the hosted collector does and keeps every
//! request for assertions. `GET /health` gives host-side traffic to record.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// One report as received by the collector
#[derive(Debug, Clone)]
pub struct Received {
    pub api_token: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct CollectorState {
    status: StatusCode,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct Collector {
    /// Base URL, e.g. `http://127.0.0.1:41234`
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
    server: tokio::task::JoinHandle<()>,
}

impl Collector {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Start a collector answering every report with `status`
pub async fn spawn_collector(status: StatusCode) -> Collector {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = CollectorState {
        status,
        received: received.clone(),
    };

    let app = Router::new()
        .route("/bugs", post(receive_report))
        .route("/health", get(|| async { "ok" }))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind collector");
    let addr = listener.local_addr().expect("Collector has no address");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Collector {
        url: format!("http://{addr}"),
        received,
        server,
    }
}

async fn receive_report(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.received.lock().push(Received {
        api_token: header("api-token"),
        content_type: header("content-type"),
        body,
    });
    state.status
}
