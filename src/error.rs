//! Error handling for the API.
//!
//! Prefer adding a variant to [HubError] over forcing a new failure into
//! `BadRequest` or `Server`; every variant documents the status code and
//! JSON body it produces.

use axum::extract::rejection::{BytesRejection, FormRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::email::EmailError;
use crate::validate::FieldErrors;

/// The error enum for all error handling across the API.
#[derive(Debug, Error)]
pub enum HubError {
    /// \[400\] The submitted form failed validation.
    ///
    /// ```json
    /// {
    ///     "success": false,
    ///     "message": "Invalid form data",
    ///     "errors": { "formErrors": [], "fieldErrors": { <field>: [<message>] } }
    /// }
    /// ```
    #[error("Invalid form data")]
    Validation(FieldErrors),
    /// \[400\] The request was well-formed but can't be acted on.
    #[error("{0}")]
    BadRequest(String),
    /// \[413\] The request body was larger than the server will read.
    #[error("Request body too large")]
    PayloadTooLarge,
    /// \[404\] The requested record doesn't exist.
    #[error("{0}")]
    NotFound(String),
    /// \[401\] The endpoint requires an admin session.
    ///
    /// Browser navigations get a redirect to the login page instead,
    /// carrying `return_to` so the admin lands back where they started.
    #[error("Authentication required")]
    Unauthorized { browser: bool, return_to: String },
    /// \[409\] The action was already performed.
    #[error("{0}")]
    Conflict(String),
    /// \[500\] Required configuration is missing from the environment.
    #[error("{0}")]
    Configuration(String),
    /// \[500\] No email transport managed to deliver a message.
    #[error(transparent)]
    Email(#[from] EmailError),
    /// \[500\] The database rejected a query or couldn't be reached.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// \[500\] Anything else that went wrong while handling the request.
    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

/// The return type for all endpoints.
pub type HubResult<T> = Result<T, HubError>;

impl HubError {
    pub fn status(&self) -> StatusCode {
        match self {
            HubError::Validation(_) | HubError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HubError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HubError::NotFound(_) => StatusCode::NOT_FOUND,
            HubError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            HubError::Conflict(_) => StatusCode::CONFLICT,
            HubError::Configuration(_)
            | HubError::Email(_)
            | HubError::Database(_)
            | HubError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_json(&self) -> Value {
        match self {
            HubError::Validation(errors) => json!({
                "success": false,
                "message": self.to_string(),
                "errors": errors,
            }),
            HubError::Configuration(message) => json!({ "success": false, "message": message }),
            HubError::Email(_) | HubError::Database(_) | HubError::Server(_) => {
                json!({ "success": false, "message": "Server error" })
            }
            _ => json!({ "success": false, "message": self.to_string() }),
        }
    }
}

impl From<BytesRejection> for HubError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HubError::PayloadTooLarge
        } else {
            HubError::BadRequest(rejection.body_text())
        }
    }
}

impl From<FormRejection> for HubError {
    fn from(rejection: FormRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HubError::PayloadTooLarge
        } else {
            HubError::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        if let HubError::Unauthorized {
            browser: true,
            return_to,
        } = &self
        {
            let location = format!("/admin/login?returnTo={}", urlencoding::encode(return_to));
            return Redirect::to(&location).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(self.as_json())).into_response()
    }
}
