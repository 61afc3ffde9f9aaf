//! The backend for the DayTime Hub charity website.
//!
//! Volunteers apply through `POST /api/apply` and visitors write in through
//! `POST /api/contact`. Both submissions are saved, rendered to a PDF, and
//! emailed to the organization's inbox. Admins log in to browse
//! applications and ask referees for references.

use std::path::PathBuf;
use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod document;
pub mod email;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod tasks;
pub mod util;
pub mod validate;

use crate::auth::{AdminCredentials, SessionStore};
use crate::db::Store;
use crate::email::Mailer;
use crate::tasks::Background;

pub use crate::routes::build_router;

/// Everything a request handler needs, shared across the server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionStore>,
    pub mailer: Arc<Mailer>,
    pub background: Background,
    /// `None` when `ADMIN_USER` or `ADMIN_PASS` is missing
    pub credentials: Option<AdminCredentials>,
    pub site: Arc<SiteOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteOptions {
    /// The directory holding the public site's pages, `img/` and `video/`
    pub root: PathBuf,
    /// Enables HTTPS redirects, HSTS, and secure cookies
    pub production: bool,
    /// Whether we terminate TLS ourselves rather than behind a proxy
    pub direct_tls: bool,
    /// How many reverse proxies in front of us append to `X-Forwarded-For`
    pub trusted_proxies: usize,
    pub cors: config::CorsOrigins,
}
