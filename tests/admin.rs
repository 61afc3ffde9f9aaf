mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{application_payload, json_body, session_cookie, text_body, TestApp, ADMIN_PASS};
use daytime_hub::config::CorsOrigins;

const BROWSER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

async fn login_with(app: &TestApp, form: String) -> axum::http::Response<Body> {
    app.send(
        Request::post("/admin/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap(),
    )
    .await
}

async fn login_forwarded_for(app: &TestApp, forwarded_for: &str) -> StatusCode {
    app.send(
        Request::post("/admin/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::from("username=admin&password=guess"))
            .unwrap(),
    )
    .await
    .status()
}

#[tokio::test]
async fn api_clients_get_401_without_a_session() {
    let app = TestApp::new();

    let response = app.get("/api/applications", None, "application/json").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Authentication required" })
    );
}

#[tokio::test]
async fn browsers_are_sent_to_the_login_page() {
    let app = TestApp::new();

    let response = app.get("/admin/applications/42?tab=refs", None, BROWSER).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/admin/login?returnTo=%2Fadmin%2Fapplications%2F42%3Ftab%3Drefs"
    );
}

#[tokio::test]
async fn made_up_sessions_are_rejected() {
    let app = TestApp::new();

    let response = app
        .get("/api/applications", Some("admin_session=guessed"), "application/json")
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logging_out_invalidates_the_session() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let response = app.get("/api/applications", Some(&cookie), "application/json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(
            Request::post("/admin/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()[header::LOCATION], "/admin/login");
    assert_eq!(session_cookie(&response).as_deref(), Some("admin_session="));

    let response = app.get("/api/applications", Some(&cookie), "application/json").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_redirects_back() {
    let app = TestApp::new();

    let response = login_with(&app, "username=admin&password=guess".to_owned()).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/admin/login?error=invalid");
    assert_eq!(session_cookie(&response), None);
}

#[tokio::test]
async fn login_only_returns_to_local_paths() {
    let app = TestApp::new();
    let password = urlencoding::encode(ADMIN_PASS);

    for (return_to, expected) in [
        ("%2Fadmin%2Fapplications%2F7", "/admin/applications/7"),
        ("%2F%2Fevil.example", "/admin"),
        ("https%3A%2F%2Fevil.example", "/admin"),
    ] {
        let response = login_with(
            &app,
            format!("username=admin&password={password}&returnTo={return_to}"),
        )
        .await;

        assert_eq!(response.headers()[header::LOCATION], expected);
    }
}

#[tokio::test]
async fn login_is_rate_limited() {
    let app = TestApp::new();

    for _ in 0..10 {
        let response = login_with(&app, "username=admin&password=guess".to_owned()).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let response = login_with(&app, "username=admin&password=guess".to_owned()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json_body(response).await["message"],
        "Too many login attempts. Please try again later."
    );
}

#[tokio::test]
async fn forwarded_for_header_cannot_reset_the_login_limit() {
    let app = TestApp::new();

    for i in 0..10 {
        assert_eq!(login_forwarded_for(&app, &format!("10.0.0.{i}")).await, StatusCode::SEE_OTHER);
    }

    assert_eq!(login_forwarded_for(&app, "10.0.0.99").await, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn trusted_proxy_hop_identifies_the_client() {
    let app = TestApp::with_site(|site| site.trusted_proxies = 1);

    for i in 0..10 {
        let forwarded_for = format!("10.0.0.{i}, 203.0.113.9");
        assert_eq!(login_forwarded_for(&app, &forwarded_for).await, StatusCode::SEE_OTHER);
    }

    assert_eq!(
        login_forwarded_for(&app, "10.0.0.99, 203.0.113.9").await,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        login_forwarded_for(&app, "203.0.113.9, 198.51.100.7").await,
        StatusCode::SEE_OTHER
    );
}

#[tokio::test]
async fn malformed_login_forms_get_json_errors() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::post("/admin/login")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("admin:guess"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn missing_credentials_are_a_configuration_error() {
    let app = TestApp::without_credentials();

    let response = app.get("/api/applications", None, "application/json").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Admin credentials not configured" })
    );
}

#[tokio::test]
async fn dashboard_flags_unsent_applications() {
    let app = TestApp::with_failing_email();
    app.post_json("/api/apply", application_payload(), None).await;
    let cookie = app.login().await;

    let response = app.get("/admin", Some(&cookie), BROWSER).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = text_body(response).await;
    assert!(page.contains("Ada Lovelace"));
    assert!(page.contains("Not emailed"));
}

#[tokio::test]
async fn reference_form_redirects_with_the_outcome() {
    let app = TestApp::new();
    app.post_json("/api/apply", application_payload(), None).await;
    let id = common_id(&app).await;
    let cookie = app.login().await;
    let path = format!("/admin/applications/{id}/reference");

    for outcome in ["sent", "already-sent"] {
        let response = app
            .send(
                Request::post(&path)
                    .header(header::COOKIE, &cookie)
                    .header(header::ACCEPT, BROWSER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/admin/applications/{id}?reference={outcome}").as_str()
        );
    }

    let page = text_body(
        app.get(
            &format!("/admin/applications/{id}?reference=already-sent"),
            Some(&cookie),
            BROWSER,
        )
        .await,
    )
    .await;
    assert!(page.contains("A reference request was already sent."));
    assert!(page.contains("Reference requested on"));
}

#[tokio::test]
async fn resend_form_emails_the_application_again() {
    let app = TestApp::new();
    app.post_json("/api/apply", application_payload(), None).await;
    let id = common_id(&app).await;
    let cookie = app.login().await;

    let response = app
        .send(
            Request::post(&format!("/admin/applications/{id}/notify"))
                .header(header::COOKIE, &cookie)
                .header(header::ACCEPT, BROWSER)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response.headers()[header::LOCATION],
        format!("/admin/applications/{id}?notify=sent").as_str()
    );
    assert_eq!(app.sent().len(), 2);

    let page = text_body(
        app.get(&format!("/admin/applications/{id}?notify=sent"), Some(&cookie), BROWSER)
            .await,
    )
    .await;
    assert!(page.contains("Application emailed to the inbox."));
}

#[tokio::test]
async fn unsent_applications_offer_a_resend_button() {
    let app = TestApp::with_failing_email();
    app.post_json("/api/apply", application_payload(), None).await;
    let id = common_id(&app).await;
    let cookie = app.login().await;

    let page = text_body(
        app.get(&format!("/admin/applications/{id}"), Some(&cookie), BROWSER)
            .await,
    )
    .await;

    assert!(page.contains(&format!("action=\"/admin/applications/{id}/notify\"")));
}

async fn common_id(app: &TestApp) -> uuid::Uuid {
    use daytime_hub::db::Store;

    app.store.applications().await.unwrap()[0].id
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();

    let response = app.get("/health", None, "application/json").await;

    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn site_pages_are_served_with_security_headers() {
    let app = TestApp::new();

    let response = app.get("/", None, BROWSER).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("content-security-policy"));
    assert!(!response.headers().contains_key("strict-transport-security"));
    assert!(text_body(response).await.contains("Welcome to DayTime Hub"));

    let response = app.get("/robots.txt", None, "*/*").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_pages_get_the_404_page() {
    let app = TestApp::new();

    let response = app.get("/secrets.env", None, BROWSER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text_body(response).await.contains("We couldn't find that page"));

    let response = app.get("/api/nothing-here", None, "application/json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn production_redirects_plain_http() {
    let app = TestApp::with_site(|site| site.production = true);

    let response = app
        .send(
            Request::get("/admin/login?returnTo=%2Fadmin")
                .header(header::HOST, "daytimehub.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://daytimehub.example/admin/login?returnTo=%2Fadmin"
    );
}

#[tokio::test]
async fn production_sends_hsts_behind_https() {
    let app = TestApp::with_site(|site| site.production = true);

    let response = app
        .send(
            Request::get("/health")
                .header(header::HOST, "daytimehub.example")
                .header("x-forwarded-proto", "https")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["strict-transport-security"],
        "max-age=63072000; includeSubDomains; preload"
    );
}

#[tokio::test]
async fn direct_tls_is_never_redirected() {
    let app = TestApp::with_site(|site| {
        site.production = true;
        site.direct_tls = true;
    });

    let response = app.get("/health", None, "application/json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("strict-transport-security"));
}

async fn allowed_origin(app: &TestApp, origin: &str) -> Option<String> {
    let response = app
        .send(
            Request::get("/health")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|value| value.to_str().unwrap().to_owned())
}

#[tokio::test]
async fn cors_only_allows_listed_origins() {
    let app = TestApp::with_site(|site| {
        site.cors = CorsOrigins::List(vec!["https://daytimehub.example".to_owned()]);
    });

    assert_eq!(
        allowed_origin(&app, "https://daytimehub.example").await.as_deref(),
        Some("https://daytimehub.example")
    );
    assert_eq!(allowed_origin(&app, "https://evil.example").await, None);
}

#[tokio::test]
async fn cors_wildcard_allows_any_origin() {
    let app = TestApp::with_site(|site| site.cors = CorsOrigins::Any);

    assert_eq!(allowed_origin(&app, "https://anywhere.example").await.as_deref(), Some("*"));
}

#[tokio::test]
async fn same_origin_cors_allows_no_one() {
    let app = TestApp::new();

    assert_eq!(allowed_origin(&app, "https://daytimehub.example").await, None);
}
