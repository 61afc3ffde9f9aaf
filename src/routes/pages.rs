//! The public site: marketing pages, their assets, and the 404 page.

use std::path::Path;

use askama::Template;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get_service;
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::util::wants_html;
use crate::{AppState, SiteOptions};

/// Pages with their own pretty path.
pub const PAGES: &[(&str, &str)] = &[
    ("/", "index.html"),
    ("/about", "about.html"),
    ("/contact", "contact.html"),
    ("/cookie-policy", "cookie-policy.html"),
    ("/donate", "donate.html"),
    ("/eligibility", "eligibility.html"),
    ("/gallery", "gallery.html"),
    ("/privacy", "privacy.html"),
    ("/safeguarding", "safeguarding.html"),
    ("/volunteer", "volunteer.html"),
];

/// Files at the site root that may be fetched by name.
pub const SITE_FILES: &[&str] = &[
    "index.html",
    "404.html",
    "about.html",
    "contact.html",
    "cookie-policy.html",
    "donate.html",
    "eligibility.html",
    "gallery.html",
    "privacy.html",
    "safeguarding.html",
    "volunteer.html",
    "styles.css",
    "script.js",
    "contact.js",
    "volunteer.js",
    "site.webmanifest",
    "robots.txt",
    "sitemap.xml",
    "apple-touch-icon.svg",
    "favicon.svg",
];

#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundPage;

pub fn routes(site: &SiteOptions) -> Router<AppState> {
    let mut router = Router::new()
        .route("/:file", axum::routing::get(site_file))
        .nest_service("/img", ServeDir::new(site.root.join("img")))
        .nest_service("/video", ServeDir::new(site.root.join("video")));

    for (path, file) in PAGES {
        router = router.route(path, get_service(ServeFile::new(site.root.join(file))));
    }

    router
}

async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// `/:file`, for the allowlisted files only.
async fn site_file(State(state): State<AppState>, request: Request) -> Response {
    let name = request
        .uri()
        .path()
        .trim_start_matches('/')
        .to_owned();

    if SITE_FILES.contains(&name.as_str()) {
        serve_file(&state.site.root.join(name), request).await
    } else {
        not_found(State(state), request).await
    }
}

/// Browsers get the site's 404 page, everyone else gets JSON.
pub async fn not_found(State(state): State<AppState>, request: Request) -> Response {
    if request.method() != Method::GET || !wants_html(request.headers()) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Not found" })),
        )
            .into_response();
    }

    let page = state.site.root.join("404.html");
    let served = serve_file(&page, Request::new(Body::empty())).await;
    if served.status().is_success() {
        let (mut parts, body) = served.into_parts();
        parts.status = StatusCode::NOT_FOUND;
        return Response::from_parts(parts, body);
    }

    let fallback = NotFoundPage
        .render()
        .unwrap_or_else(|_| "<h1>Page not found</h1>".to_owned());
    (StatusCode::NOT_FOUND, Html(fallback)).into_response()
}
