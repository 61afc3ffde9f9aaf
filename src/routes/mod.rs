//! All routes for the server.
//!
//! | Route                                  | Access       |
//! |----------------------------------------|--------------|
//! | `POST /api/apply`                      | public       |
//! | `POST /api/contact`                    | rate limited |
//! | `GET /api/applications`                | admin        |
//! | `GET /api/applications/:id`            | admin        |
//! | `POST /api/applications/:id/reference` | admin        |
//! | `POST /api/applications/:id/notify`    | admin        |
//! | `/admin/...`                           | admin pages  |
//! | everything else                        | public site  |

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::rate_limit::{limit_requests, RateLimiter};
use crate::{AppState, SiteOptions};

pub mod admin;
pub mod applications;
pub mod contact;
pub mod pages;
pub mod security;

/// The largest request body we'll read.
pub const BODY_LIMIT: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let proxies = state.site.trusted_proxies;
    let contact_limit = from_fn_with_state(RateLimiter::contact().behind_proxies(proxies), limit_requests);
    let login_limit = from_fn_with_state(RateLimiter::login().behind_proxies(proxies), limit_requests);

    let api = Router::new()
        .route("/api/apply", post(applications::submit))
        .route("/api/applications", get(applications::list))
        .route("/api/applications/:id", get(applications::detail))
        .route(
            "/api/applications/:id/reference",
            post(applications::request_reference),
        )
        .route(
            "/api/applications/:id/notify",
            post(applications::resend_notification),
        )
        .route("/api/contact", post(contact::submit).layer(contact_limit));

    let admin = Router::new()
        .route("/admin", get(admin::dashboard))
        .route(
            "/admin/login",
            get(admin::login_page).merge(post(admin::login).layer(login_limit)),
        )
        .route("/admin/logout", post(admin::logout))
        .route("/admin/applications/:id", get(admin::application_page))
        .route(
            "/admin/applications/:id/reference",
            post(admin::request_reference),
        )
        .route(
            "/admin/applications/:id/notify",
            post(admin::resend_notification),
        );

    let routes = Router::new()
        .route("/health", get(health))
        .merge(api)
        .merge(admin)
        .merge(pages::routes(&state.site))
        .fallback(pages::not_found);

    with_layers(routes, &state.site).with_state(state)
}

/// Wrap `router` in the middleware every response passes through.
///
/// Panics are caught innermost so their responses still get security
/// headers and CORS.
fn with_layers<S>(router: Router<S>, site: &Arc<SiteOptions>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(security::panic_response))
        .layer(from_fn_with_state(site.clone(), security::headers))
        .layer(security::cors(&site.cors))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
