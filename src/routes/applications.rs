use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::error::{HubError, HubResult};
use crate::models::application::Application;
use crate::pipeline;
use crate::AppState;

/// Read a JSON body, treating anything unparseable as a non-object so
/// validation reports it like any other bad submission.
pub(crate) fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

/// Ids that aren't UUIDs can't name an application.
pub(crate) fn application_id(id: &str) -> HubResult<Uuid> {
    id.parse()
        .map_err(|_| HubError::NotFound("Application not found".to_owned()))
}

pub async fn submit(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> HubResult<Json<Value>> {
    let body = body?;
    pipeline::submit_application(&state, &json_body(&body)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Application submitted successfully",
    })))
}

pub async fn list(_admin: AdminSession, State(state): State<AppState>) -> HubResult<Json<Value>> {
    let applications = state.store.applications().await?;

    Ok(Json(json!({ "success": true, "data": applications })))
}

pub async fn detail(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Json<Value>> {
    let application = Application::with_id(application_id(&id)?, state.store.as_ref()).await?;

    Ok(Json(json!({ "success": true, "data": application })))
}

pub async fn request_reference(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Json<Value>> {
    let application = pipeline::request_reference(&state, application_id(&id)?).await?;

    Ok(Json(json!({ "success": true, "data": application })))
}

pub async fn resend_notification(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Json<Value>> {
    let application = pipeline::resend_notification(&state, application_id(&id)?).await?;

    Ok(Json(json!({ "success": true, "data": application })))
}
