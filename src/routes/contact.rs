use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::HubResult;
use crate::pipeline;
use crate::routes::applications::json_body;
use crate::AppState;

/// Answers once the message is saved; the email follows in the background.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> HubResult<Json<Value>> {
    let body = body?;
    let message = pipeline::submit_contact(&state, &json_body(&body)).await?;

    Ok(Json(json!({ "success": true, "data": message })))
}
