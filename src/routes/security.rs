//! Headers and redirects applied to every response.

use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderName, HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsOrigins;
use crate::SiteOptions;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self'; \
    style-src 'self' 'unsafe-inline'; \
    img-src 'self' data: blob:; \
    connect-src 'self'; \
    font-src 'self' data:; \
    frame-src 'self' https://www.google.com https://www.google.com/maps; \
    frame-ancestors 'self'; \
    base-uri 'self'; \
    form-action 'self'";

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ("cross-origin-resource-policy", "same-site"),
];

const HSTS: &str = "max-age=63072000; includeSubDomains; preload";

fn arrived_over_https(request: &Request, site: &SiteOptions) -> bool {
    site.direct_tls
        || request
            .headers()
            .get("x-forwarded-proto")
            .and_then(|proto| proto.to_str().ok())
            .map_or(false, |proto| proto.eq_ignore_ascii_case("https"))
}

/// In production, plain HTTP is redirected to HTTPS before anything else.
pub async fn headers(
    State(site): State<Arc<SiteOptions>>,
    request: Request,
    next: Next,
) -> axum::response::Response {
    if site.production && !arrived_over_https(&request, &site) {
        let host = request
            .headers()
            .get(HOST)
            .and_then(|host| host.to_str().ok())
            .unwrap_or("localhost");
        let path = request
            .uri()
            .path_and_query()
            .map_or("/", |path| path.as_str());

        return (
            StatusCode::MOVED_PERMANENTLY,
            [(LOCATION, format!("https://{host}{path}"))],
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if site.production {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static(HSTS),
        );
    }

    response
}

pub fn cors(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    match origins {
        CorsOrigins::Any => layer.allow_origin(AllowOrigin::any()),
        CorsOrigins::SameOrigin => layer,
        CorsOrigins::List(list) => layer.allow_origin(
            list.iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>(),
        ),
    }
}

/// A panicking handler answers like any other server error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": "Server error" })),
    )
        .into_response()
}
