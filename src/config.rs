//! Settings read from the environment (and `.env`, if present).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::email::smtp::{SmtpSettings, IMPLICIT_TLS_PORT};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const GMAIL_HOST: &str = "smtp.gmail.com";

/// Local development origins, used when `CORS_ORIGIN` isn't set.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5500",
    "http://127.0.0.1:5500",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionBackend {
    #[default]
    Memory,
    Database,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmailConfig {
    pub sendgrid_api_key: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub base_url: String,
}

/// Which origins may call the API from a browser.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    SameOrigin,
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub admin_user: Option<String>,
    pub admin_pass: Option<String>,
    pub cors: CorsOrigins,
    pub email: EmailConfig,
    pub site_root: PathBuf,
    pub tls: Option<(PathBuf, PathBuf)>,
    pub production: bool,
    /// Reverse proxies whose `X-Forwarded-For` entries we believe
    pub trusted_proxies: usize,
    pub sessions: SessionBackend,
    pub db_connect_retries: u32,
    pub db_connect_delay: Duration,
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|value| value.parse::<T>().with_context(|| format!("Invalid `{name}`: {value}")))
        .transpose()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenv::dotenv();

        let database_url = var("DATABASE_URL").context("`DATABASE_URL` not set")?;
        let production = var("APP_ENV")
            .or_else(|| var("NODE_ENV"))
            .map_or(false, |env| env == "production");

        let tls = match (var("SSL_KEY_PATH"), var("SSL_CERT_PATH")) {
            (Some(key), Some(cert)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            _ => None,
        };

        let sessions = match var("SESSION_STORE").as_deref() {
            Some("database") | Some("postgres") => SessionBackend::Database,
            _ => SessionBackend::Memory,
        };

        Ok(Self {
            port: parsed("PORT")?.unwrap_or(DEFAULT_PORT),
            database_url,
            admin_user: var("ADMIN_USER"),
            admin_pass: var("ADMIN_PASS"),
            cors: CorsOrigins::parse(var("CORS_ORIGIN").as_deref()),
            email: EmailConfig::from_env()?,
            site_root: var("SITE_ROOT").map_or_else(|| PathBuf::from(".."), PathBuf::from),
            tls,
            production,
            trusted_proxies: trust_proxy(var("TRUST_PROXY").as_deref())?,
            sessions,
            db_connect_retries: parsed("DB_CONNECT_RETRIES")?.unwrap_or(5),
            db_connect_delay: Duration::from_secs(parsed("DB_CONNECT_DELAY_SECS")?.unwrap_or(2)),
        })
    }
}

/// `TRUST_PROXY` is a hop count, with `true` meaning one proxy.
fn trust_proxy(value: Option<&str>) -> anyhow::Result<usize> {
    match value {
        None | Some("false") => Ok(0),
        Some("true") => Ok(1),
        Some(hops) => hops
            .parse()
            .with_context(|| format!("Invalid `TRUST_PROXY`: {hops}")),
    }
}

impl EmailConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let user = var("EMAIL_USER");
        let gmail = var("EMAIL_PROVIDER").map_or(false, |provider| provider.eq_ignore_ascii_case("gmail"));

        let host = var("SMTP_HOST").or_else(|| gmail.then(|| GMAIL_HOST.to_owned()));
        let port = match parsed::<u16>("SMTP_PORT")? {
            Some(port) => port,
            None if gmail => IMPLICIT_TLS_PORT,
            None => 587,
        };
        let secure = var("SMTP_SECURE").map_or(port == IMPLICIT_TLS_PORT, |secure| secure == "true");

        let smtp = match (host, user.clone(), var("EMAIL_PASS")) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpSettings {
                host,
                port,
                secure,
                user,
                pass,
            }),
            _ => None,
        };

        Ok(Self {
            sendgrid_api_key: var("SENDGRID_API_KEY"),
            smtp,
            from: var("EMAIL_FROM").or(user),
            to: var("EMAIL_TO"),
            base_url: var("APP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        })
    }
}

impl CorsOrigins {
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::List(DEFAULT_CORS_ORIGINS.iter().map(|&origin| origin.to_owned()).collect());
        };

        let origins: Vec<String> = value
            .split(',')
            .map(|origin| origin.trim().to_owned())
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.iter().any(|origin| origin == "*") {
            Self::Any
        } else if origins.is_empty() {
            Self::SameOrigin
        } else {
            Self::List(origins)
        }
    }
}
