use strava_tools::common::web_client::DataFormat;
use strava_tools::download::download_activity;
use strava_tools::{Settings, StravaError, WebClient};
use tempdir::TempDir;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<html><body>
<form id="login_form" action="/session" method="post">
  <input name="utf8" type="hidden" value="&#x2713;" />
  <input type="hidden" name="authenticity_token" value="login-token==" />
  <input type="email" name="email" />
  <input type="password" name="password" />
</form></body></html>"#;

const DASHBOARD_PAGE: &str = r#"<html><head>
<meta name="csrf-param" content="authenticity_token" />
<meta name="csrf-token" content="csrf-123" />
</head><body>Dashboard</body></html>"#;

async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_string_contains("email=me%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("authenticity_token=login-token%3D%3D"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dashboard", server.uri()).as_str())
                .insert_header("Set-Cookie", "_strava4_session=abc; path=/"),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD_PAGE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_download_original_file() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/activities/42/export_original"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="Morning_Ride.fit""#)
                .set_body_bytes(b"FIT-BYTES".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();

    let dir = TempDir::new("strava_download").unwrap();
    let saved = download_activity(&web, 42, DataFormat::Original, dir.path())
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("Morning_Ride.fit"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"FIT-BYTES");
}

#[tokio::test]
async fn test_export_without_disposition_uses_activity_id() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/activities/42/export_gpx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<gpx/>"))
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();
    let file = web.get_activity_data(42, DataFormat::Gpx).await.unwrap();

    assert_eq!(file.filename, "42.gpx");
    assert_eq!(file.bytes().await.unwrap(), b"<gpx/>");
}

#[tokio::test]
async fn test_export_of_foreign_activity_fails() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/activities/7/export_original"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/dashboard"))
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();
    let err = web
        .get_activity_data(7, DataFormat::Original)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, StravaError::Api { status, .. } if status.as_u16() == 302));
}

#[tokio::test]
async fn test_delete_posts_method_override_with_csrf_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/activities/42"))
        .and(body_string_contains("_method=delete"))
        .and(body_string_contains("authenticity_token=csrf-123"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/athlete/training", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();

    web.delete_activity(42).await.unwrap();
}

#[tokio::test]
async fn test_delete_rejected_when_not_redirected_to_training() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/activities/43"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();

    let err = web.delete_activity(43).await.unwrap_err();
    assert!(matches!(err, StravaError::Api { status, .. } if status.as_u16() == 422));
}

#[tokio::test]
async fn test_wrong_password_fails_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/login", server.uri()).as_str()),
        )
        .mount(&server)
        .await;

    let result =
        WebClient::login("me@example.com", "wrong", Settings::with_base_url(&server.uri())).await;

    assert!(matches!(result, Err(StravaError::WebLogin(_))));
}

#[tokio::test]
async fn test_website_requests_carry_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .and(header_regex("user-agent", "^strava-tools/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(header_regex("user-agent", "^strava-tools/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dashboard", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD_PAGE))
        .mount(&server)
        .await;

    WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_download_ignores_empty_extended_filename() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/activities/42/export_original"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Content-Disposition",
                    r#"attachment; filename="ride.fit"; filename*=UTF-8''"#,
                )
                .set_body_bytes(b"FIT".to_vec()),
        )
        .mount(&server)
        .await;

    let web = WebClient::login("me@example.com", "hunter2", Settings::with_base_url(&server.uri()))
        .await
        .unwrap();
    let file = web.get_activity_data(42, DataFormat::Original).await.unwrap();

    assert_eq!(file.filename, "ride.fit");
}
