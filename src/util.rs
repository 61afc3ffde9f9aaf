//! Extra utilities for use elsewhere in the API.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::header::ACCEPT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const DISPLAY_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Render a timestamp the way documents and admin pages show it.
pub fn display_time(time: OffsetDateTime) -> String {
    time.to_offset(time::UtcOffset::UTC)
        .format(DISPLAY_FORMAT)
        .unwrap_or_else(|_| time.to_string())
}

/// Whether the client is a browser navigation rather than an API call.
pub fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .map_or(false, |accept| accept.contains("text/html"))
}

/// Identify the client behind a request for rate limiting.
///
/// `X-Forwarded-For` is client input, so it's only read when we sit behind
/// `trusted_proxies` reverse proxies. Each proxy appends the address it saw,
/// so the client is the entry that many hops from the right.
pub fn client_address(parts: &Parts, trusted_proxies: usize) -> String {
    let forwarded = (trusted_proxies > 0)
        .then(|| parts.headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let hops: Vec<&str> = value
                .split(',')
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .collect();
            hops.get(hops.len().saturating_sub(trusted_proxies))
                .map(|&hop| hop.to_owned())
        });

    forwarded
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Only same-origin paths are allowed as post-login redirects.
pub fn safe_return_to(return_to: Option<&str>) -> &str {
    match return_to {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/admin",
    }
}
