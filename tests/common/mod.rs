#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use daytime_hub::auth::{AdminCredentials, MemorySessionStore};
use daytime_hub::config::CorsOrigins;
use daytime_hub::db::MemoryStore;
use daytime_hub::email::{Envelope, Mailer, Transport};
use daytime_hub::tasks::Background;
use daytime_hub::{build_router, AppState, SiteOptions};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "correct horse battery staple";
pub const INBOX: &str = "inbox@daytimehub.example";

/// Keeps every envelope it's given, or refuses them all.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub fail: bool,
    pub sent: Arc<Mutex<Vec<Envelope>>>,
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, envelope: &Envelope) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub transport: RecordingTransport,
    pub background: Background,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_transport(RecordingTransport::default(), true)
    }

    /// An app whose site options have been adjusted by `configure`.
    pub fn with_site(configure: impl FnOnce(&mut SiteOptions)) -> Self {
        let mut site = default_site();
        configure(&mut site);
        Self::build(RecordingTransport::default(), true, site)
    }

    pub fn with_failing_email() -> Self {
        Self::with_transport(
            RecordingTransport {
                fail: true,
                ..Default::default()
            },
            true,
        )
    }

    pub fn without_credentials() -> Self {
        Self::with_transport(RecordingTransport::default(), false)
    }

    fn with_transport(transport: RecordingTransport, credentials: bool) -> Self {
        Self::build(transport, credentials, default_site())
    }

    fn build(transport: RecordingTransport, credentials: bool, site: SiteOptions) -> Self {
        let store = Arc::new(MemoryStore::new());
        let background = Background::new();
        let mailer = Mailer::new(
            vec![Box::new(transport.clone())],
            Some("website@daytimehub.example".to_owned()),
            Some(INBOX.to_owned()),
            "https://daytimehub.example",
        );

        let state = AppState {
            store: store.clone(),
            sessions: Arc::new(MemorySessionStore::new()),
            mailer: Arc::new(mailer),
            background: background.clone(),
            credentials: credentials.then(|| AdminCredentials {
                user: ADMIN_USER.to_owned(),
                pass: ADMIN_PASS.to_owned(),
            }),
            site: Arc::new(site),
        };

        Self {
            router: build_router(state),
            store,
            transport,
            background,
        }
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.transport.sent.lock().unwrap().clone()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, path: &str, body: Value, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>, accept: &str) -> Response<Body> {
        let mut request = Request::get(path).header(header::ACCEPT, accept);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.send(request.body(Body::empty()).unwrap()).await
    }

    /// Log in and return the `Cookie` header value for the new session.
    pub async fn login(&self) -> String {
        let form = format!(
            "username={}&password={}&returnTo=%2Fadmin",
            ADMIN_USER,
            urlencoding::encode(ADMIN_PASS)
        );
        let response = self
            .send(
                Request::post("/admin/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.headers()[header::LOCATION], "/admin");
        session_cookie(&response).expect("login sets a session cookie")
    }
}

pub fn default_site() -> SiteOptions {
    SiteOptions {
        root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/site"),
        production: false,
        direct_tls: false,
        trusted_proxies: 0,
        cors: CorsOrigins::SameOrigin,
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("admin_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn application_payload() -> Value {
    json!({
        "fullName": "Ada Lovelace",
        "email": "ada@example.org",
        "address": "12 Analytical Row, London",
        "postcode": "NW1 2AB",
        "phone": "07700 900123",
        "emergencyName": "Charles Babbage",
        "emergencyPhone": "07700 900456",
        "role": "Front of House",
        "availability": "Weekday mornings",
        "experience": "Ran a community cafe for two years",
        "referee1Name": "Mary Somerville",
        "referee1Email": "mary@example.org",
        "referee1Relationship": "Former manager",
        "signature": "Ada Lovelace",
        "signatureDate": "2026-03-04",
        "consent": true
    })
}

pub fn contact_payload() -> Value {
    json!({
        "name": "Grace Hopper",
        "email": "grace@example.org",
        "subject": "Donations",
        "message": "Can I drop off tinned food on Saturday?"
    })
}
