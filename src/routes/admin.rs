//! The admin dashboard's HTML pages and login flow.

use askama::Template;
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::Form;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::auth::{expired_session_cookie, session_cookie, session_token, AdminSession};
use crate::document::Document;
use crate::error::{HubError, HubResult};
use crate::models::application::Application;
use crate::pipeline;
use crate::routes::applications::application_id;
use crate::util::{display_time, safe_return_to};
use crate::AppState;

fn render(template: &impl Template) -> HubResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|error| HubError::Server(anyhow::Error::from(error).context("Failed to render page")))
}

#[derive(Deserialize)]
pub struct LoginQuery {
    error: Option<String>,
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/login.html")]
struct LoginPage<'a> {
    invalid: bool,
    return_to: &'a str,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> HubResult<Html<String>> {
    render(&LoginPage {
        invalid: query.error.as_deref() == Some("invalid"),
        return_to: safe_return_to(query.return_to.as_deref()),
    })
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> HubResult<(CookieJar, Redirect)> {
    let Form(form) = form?;
    let credentials = state
        .credentials
        .as_ref()
        .ok_or_else(|| HubError::Configuration("Admin credentials not configured".to_owned()))?;

    if !credentials.matches(&form.username, &form.password) {
        tracing::warn!(username = %form.username, "failed admin login");
        return Ok((jar, Redirect::to("/admin/login?error=invalid")));
    }

    let token = state.sessions.create().await?;
    tracing::info!("admin logged in");

    Ok((
        jar.add(session_cookie(token, state.site.production)),
        Redirect::to(safe_return_to(form.return_to.as_deref())),
    ))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> HubResult<(CookieJar, Redirect)> {
    if let Some(token) = session_token(&jar) {
        state.sessions.revoke(&token).await?;
    }

    Ok((
        jar.remove(expired_session_cookie(state.site.production)),
        Redirect::to("/admin/login"),
    ))
}

struct DashboardRow {
    application: Application,
    submitted: String,
}

#[derive(Template)]
#[template(path = "admin/index.html")]
struct DashboardPage {
    rows: Vec<DashboardRow>,
    unnotified: usize,
}

pub async fn dashboard(_admin: AdminSession, State(state): State<AppState>) -> HubResult<Html<String>> {
    let rows: Vec<DashboardRow> = state
        .store
        .applications()
        .await?
        .into_iter()
        .map(|application| DashboardRow {
            submitted: display_time(application.created_at),
            application,
        })
        .collect();

    render(&DashboardPage {
        unnotified: rows
            .iter()
            .filter(|row| row.application.notified_at.is_none())
            .count(),
        rows,
    })
}

#[derive(Deserialize)]
pub struct DetailQuery {
    reference: Option<String>,
    notify: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/application.html")]
struct ApplicationPage {
    application: Application,
    document: Document,
    notice: Option<&'static str>,
}

impl ApplicationPage {
    fn reference_requested_on(&self) -> Option<String> {
        self.application.reference_requested_at.map(display_time)
    }
}

/// The outcome of the reference form, carried through the redirect.
fn reference_notice(outcome: &str) -> Option<&'static str> {
    match outcome {
        "sent" => Some("Reference request sent."),
        "already-sent" => Some("A reference request was already sent."),
        "missing-referee" => Some("Referee details are missing."),
        "failed" => Some("The reference request couldn't be sent. Please try again."),
        _ => None,
    }
}

fn notify_notice(outcome: &str) -> Option<&'static str> {
    match outcome {
        "sent" => Some("Application emailed to the inbox."),
        "failed" => Some("The application couldn't be emailed. Please try again."),
        _ => None,
    }
}

pub async fn application_page(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> HubResult<Html<String>> {
    let application = Application::with_id(application_id(&id)?, state.store.as_ref()).await?;

    render(&ApplicationPage {
        document: Document::for_application(&application),
        notice: query
            .reference
            .as_deref()
            .and_then(reference_notice)
            .or_else(|| query.notify.as_deref().and_then(notify_notice)),
        application,
    })
}

/// The form version of `POST /api/applications/:id/reference`.
pub async fn request_reference(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Redirect> {
    let id = application_id(&id)?;
    let outcome = match pipeline::request_reference(&state, id).await {
        Ok(_) => "sent",
        Err(HubError::Conflict(_)) => "already-sent",
        Err(HubError::BadRequest(_)) => "missing-referee",
        Err(error @ HubError::NotFound(_)) => return Err(error),
        Err(error) => {
            tracing::error!(%id, %error, "reference request failed");
            "failed"
        }
    };

    Ok(Redirect::to(&format!("/admin/applications/{id}?reference={outcome}")))
}

/// The form version of `POST /api/applications/:id/notify`.
pub async fn resend_notification(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Redirect> {
    let id = application_id(&id)?;
    let outcome = match pipeline::resend_notification(&state, id).await {
        Ok(_) => "sent",
        Err(error @ HubError::NotFound(_)) => return Err(error),
        Err(error) => {
            tracing::error!(%id, %error, "resending application email failed");
            "failed"
        }
    };

    Ok(Redirect::to(&format!("/admin/applications/{id}?notify={outcome}")))
}
