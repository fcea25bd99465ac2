//! HTTP routes.
//!
//! ```text
//! POST /api/deleteImage   {"publicId": "..."}  (object, or a JSON string holding it)
//!   200 {"success": true, "result": <host reply>}
//!   400 {"error": "El body no es JSON válido" | "Falta el publicId"}
//!   405 {"error": "Método no permitido"}
//!   500 {"error": <host message>}
//!
//! GET  /health            {"status": "ok", "version": "..."}
//! ```

use axum::{
    body::Bytes,
    extract::State,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/deleteImage",
            post(delete_image).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn delete_image(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = parse_body(&body)?;
    let public_id = public_id(&body)?;

    info!(public_id = %public_id, "Deleting image");
    let result = state.destroyer.destroy(public_id).await?;

    Ok(Json(json!({ "success": true, "result": result })))
}

/// Accepts a JSON object or a JSON string whose content is the object.
/// An empty body reads as an empty object.
fn parse_body(bytes: &[u8]) -> ApiResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_json::from_slice(bytes).map_err(|_| ApiError::InvalidJson)?;
    match value {
        Value::String(inner) => serde_json::from_str(&inner).map_err(|_| ApiError::InvalidJson),
        other => Ok(other),
    }
}

fn public_id(body: &Value) -> ApiResult<&str> {
    body.get("publicId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingPublicId)
}
