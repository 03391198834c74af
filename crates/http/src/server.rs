use crate::error::{ErrorKind, Result};
use crate::router::{Route, UrlRouter};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use exn::ResultExt;
use serde::Deserialize;
use std::future::Future;
use tether_sync::{StatusReport, StatusResolver};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub router: UrlRouter,
    pub status: StatusResolver,
}

#[derive(Debug, Default, Deserialize)]
struct StatusQuery {
    /// Comma separated remote ids.
    #[serde(default)]
    ids: String,
    batch_id: Option<String>,
}

/// Routes:
/// - `GET /{prefix}/:slug`: 302 to the resolved target, 404 for unknown slugs.
/// - `GET /status?ids=a,b&batch_id=x`: composite statuses as JSON.
/// - `GET /health`
pub fn app(state: AppState, prefix: &str) -> Router {
    Router::new()
        .route(&format!("/{}/:slug", prefix.trim_matches('/')), get(route_slug))
        .route("/status", get(status))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_slug(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.router.resolve(&slug).await {
        Route::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        // Always 302: the target changes as soon as the page is synced.
        Route::Local(url) | Route::Remote(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
    }
}

async fn status(State(state): State<AppState>, Query(query): Query<StatusQuery>) -> Json<StatusReport> {
    let ids: Vec<String> =
        query.ids.split(',').map(str::trim).filter(|id| !id.is_empty()).map(str::to_string).collect();
    Json(state.status.status_for_many(&ids, query.batch_id.as_deref()).await)
}

/// Serve `app` on `bind` until `shutdown` resolves.
pub async fn serve(app: Router, bind: &str, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await.or_raise(|| ErrorKind::Bind(bind.to_string()))?;
    tracing::info!(address = %bind, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await.or_raise(|| ErrorKind::Serve)?;
    tracing::info!("server shut down");
    Ok(())
}
