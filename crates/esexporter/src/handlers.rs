use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tracing::{error, warn};

use esexporter_core::Deadline;
use esexporter_core::exposition::{self, CONTENT_TYPE};
use esexporter_core::source::SourceReader;

use crate::state::SharedState;

const INDEX: &str = r#"<html>
<head><title>EventStoreDB Exporter</title></head>
<body>
<h1>EventStoreDB Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

pub(crate) fn build_router<S: SourceReader + 'static>(state: SharedState<S>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics::<S>))
        .with_state(state)
        .layer(CompressionLayer::new())
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX)
}

async fn handle_health() -> &'static str {
    "ok"
}

/// Runs one scrape and renders it. A failed scrape still answers 200 with
/// `eventstore_up 0`.
async fn handle_metrics<S: SourceReader>(State(state): State<SharedState<S>>) -> Response {
    let deadline = Deadline::after(state.timeout);
    let snapshot = match state.collector.collect(deadline).await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "scrape failed");
            None
        }
    };

    match exposition::render(snapshot.as_ref(), state.cluster_mode) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
