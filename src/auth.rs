//! Authorization for the admin dashboard and its API.
//!
//! Extract an [AdminSession] as an endpoint parameter to require a
//! logged-in admin. Sessions are opaque tokens in the `admin_session`
//! cookie, checked against a [SessionStore].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::util::{current_time, wants_html};
use crate::AppState;

pub const SESSION_COOKIE: &str = "admin_session";

/// Where admin session tokens live.
///
/// A token is valid from [create](SessionStore::create) until it's
/// [revoked](SessionStore::revoke).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> HubResult<String>;
    async fn is_valid(&self, token: &str) -> HubResult<bool>;
    async fn revoke(&self, token: &str) -> HubResult<()>;
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Sessions held in this process, lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    tokens: Mutex<HashMap<String, OffsetDateTime>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the session behind `token` was created.
    pub fn created_at(&self, token: &str) -> Option<OffsetDateTime> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .copied()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> HubResult<String> {
        let token = new_token();
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), current_time());

        Ok(token)
    }

    async fn is_valid(&self, token: &str) -> HubResult<bool> {
        Ok(self.tokens.lock().unwrap_or_else(PoisonError::into_inner).contains_key(token))
    }

    async fn revoke(&self, token: &str) -> HubResult<()> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).remove(token);

        Ok(())
    }
}

/// Sessions shared by every instance through Postgres.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> HubResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS admin_sessions (
                 token TEXT PRIMARY KEY,
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self) -> HubResult<String> {
        let token = new_token();
        sqlx::query("INSERT INTO admin_sessions (token) VALUES ($1)")
            .bind(&token)
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    async fn is_valid(&self, token: &str) -> HubResult<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT token FROM admin_sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    async fn revoke(&self, token: &str) -> HubResult<()> {
        sqlx::query("DELETE FROM admin_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// The admin login, from `ADMIN_USER` and `ADMIN_PASS`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredentials {
    pub user: String,
    /// Either the password itself or a bcrypt hash of it
    pub pass: String,
}

impl AdminCredentials {
    pub fn from_parts(user: Option<String>, pass: Option<String>) -> Option<Self> {
        Some(Self {
            user: user?,
            pass: pass?,
        })
    }

    pub fn matches(&self, user: &str, pass: &str) -> bool {
        if user != self.user {
            return false;
        }

        if self.pass.starts_with("$2") {
            bcrypt::verify(pass, &self.pass).unwrap_or_else(|error| {
                tracing::error!(%error, "ADMIN_PASS looks like a bcrypt hash but couldn't be used");
                false
            })
        } else {
            pass == self.pass
        }
    }
}

/// Proof that the request carries a valid admin session.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> HubResult<Self> {
        if state.credentials.is_none() {
            return Err(HubError::Configuration(
                "Admin credentials not configured".to_owned(),
            ));
        }

        if let Some(token) = session_token(&CookieJar::from_headers(&parts.headers)) {
            if state.sessions.is_valid(&token).await? {
                return Ok(AdminSession { token });
            }
        }

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);

        Err(HubError::Unauthorized {
            browser: wants_html(&parts.headers),
            return_to: uri
                .path_and_query()
                .map_or("/admin", |path| path.as_str())
                .to_owned(),
        })
    }
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_sessions_are_rejected() {
        let store = MemorySessionStore::new();
        let token = store.create().await.unwrap();

        assert!(store.is_valid(&token).await.unwrap());
        store.revoke(&token).await.unwrap();
        assert!(!store.is_valid(&token).await.unwrap());
        assert_eq!(store.created_at(&token), None);
    }

    #[tokio::test]
    async fn sessions_remember_when_they_started() {
        let store = MemorySessionStore::new();
        let before = current_time();

        let token = store.create().await.unwrap();

        let created = store.created_at(&token).unwrap();
        assert!(created >= before && created <= current_time());
    }

    #[test]
    fn plain_and_hashed_passwords() {
        let plain = AdminCredentials {
            user: "admin".to_owned(),
            pass: "hunter2".to_owned(),
        };
        assert!(plain.matches("admin", "hunter2"));
        assert!(!plain.matches("admin", "hunter3"));
        assert!(!plain.matches("root", "hunter2"));

        let hashed = AdminCredentials {
            user: "admin".to_owned(),
            pass: bcrypt::hash("hunter2", 4).unwrap(),
        };
        assert!(hashed.matches("admin", "hunter2"));
        assert!(!hashed.matches("admin", "hunter3"));
    }

    #[test]
    fn credentials_need_both_halves() {
        assert!(AdminCredentials::from_parts(Some("admin".to_owned()), None).is_none());
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc".to_owned(), true).to_string();

        assert!(cookie.starts_with("admin_session=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
    }
}
