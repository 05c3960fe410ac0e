use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use configurator::{ar_links, command};
use shared::{Ack, ConfigurationSummary, LaunchDecision};

use crate::AppState;

/// Health check
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Embedding command channel: one record in, one acknowledgement out
pub async fn command(State(state): State<AppState>, body: String) -> Json<Ack> {
    let mut session = state.session.lock().await;
    Json(command::execute_json(&mut session, &body).await)
}

/// Current configuration summary
pub async fn current_state(State(state): State<AppState>) -> Json<ConfigurationSummary> {
    Json(state.session.lock().await.summary())
}

/// Publish the current configuration.
///
/// The session lock is released while the store is checked and the artifacts
/// are serialized and uploaded; the busy flag keeps a second publish out.
pub async fn publish(State(state): State<AppState>) -> Response {
    let (snapshot, pipeline) = {
        let mut session = state.session.lock().await;
        match session.begin_publish() {
            Ok(Some(snapshot)) => (snapshot, session.pipeline()),
            Ok(None) => {
                return (StatusCode::ACCEPTED, Json(json!({ "status": "busy" }))).into_response()
            }
            Err(e) => {
                tracing::error!("Publish rejected: {}", e);
                return error_response(StatusCode::CONFLICT, e.to_string());
            }
        }
    };

    let result = pipeline.publish_snapshot(snapshot).await;

    let mut session = state.session.lock().await;
    match session.finish_publish(result) {
        Ok(published) => Json(published).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub glb_location: Option<String>,
    #[serde(default)]
    pub usdz_location: Option<String>,
}

/// Which AR link a device should open. Falls back to the request's own
/// `User-Agent` when the body carries none.
pub async fn launch(headers: HeaderMap, Json(request): Json<LaunchRequest>) -> Json<LaunchDecision> {
    let user_agent = request.user_agent.unwrap_or_else(|| {
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    });
    Json(ar_links::resolve_launch(
        &user_agent,
        request.glb_location.as_deref(),
        request.usdz_location.as_deref(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ArQuery {
    pub hash: Option<String>,
}

/// AR viewer page for a published configuration hash
pub async fn ar_viewer(State(state): State<AppState>, Query(query): Query<ArQuery>) -> Response {
    match query.hash.filter(|h| !h.trim().is_empty()) {
        Some(hash) => Html(ar_links::viewer_page_html(hash.trim(), &state.settings.viewer)).into_response(),
        None => error_response(StatusCode::BAD_REQUEST, "Missing configuration hash".to_string()),
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
