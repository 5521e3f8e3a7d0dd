use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lifechanger_sync::crypto::CryptoEngine;
use lifechanger_sync::providers::garmin_from_config;
use lifechanger_sync::session::SessionManager;
use lifechanger_sync::store::MemoryStore;
use lifechanger_sync::wellness::STRESS_DETAILS_PATH;
use lifechanger_sync::{api, AppState, Config};

const TOKEN_PATH: &str = "/oauth-service/oauth/token";

fn test_config(server: &MockServer) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        base_url: "http://localhost:8420".into(),
        redirect_url: "http://localhost:8420/v1/oauth/callback".into(),
        garmin_client_id: "client".into(),
        garmin_client_secret: "secret".into(),
        garmin_auth_url: format!("{}/oauthConfirm", server.uri()),
        garmin_token_url: format!("{}{TOKEN_PATH}", server.uri()),
        garmin_api_base_url: server.uri(),
        garmin_scopes: vec!["activity.read".into()],
        token_store_path: "unused.json".into(),
        master_key: base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]),
        hmac_secret: base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]),
    }
}

fn app(server: &MockServer) -> Router {
    let config = test_config(server);
    let crypto = Arc::new(CryptoEngine::new(&config.master_key, &config.hmac_secret).unwrap());
    let session = SessionManager::new(
        Arc::new(garmin_from_config(&config)),
        Arc::new(MemoryStore::new()),
        &config.garmin_api_base_url,
    );
    api::router(Arc::new(AppState::new(config, crypto, session)))
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 86400,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn status_reports_provider() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "lifechanger-sync");
    assert_eq!(body["provider"], "Garmin Connect");
}

#[tokio::test]
async fn callback_without_code_is_bad_request() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/oauth/callback", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn authorize_then_callback_connects() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    let app = app(&server);

    let req = Request::builder()
        .uri("/v1/oauth/authorize")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = resp.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{}/oauthConfirm?", server.uri())));
    let location = url::Url::parse(&location).unwrap();
    let signed_state = location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let (_, before) = send(&app, "GET", "/v1/session", None).await;
    assert_eq!(before["data"]["authenticated"], false);

    let callback = format!(
        "/v1/oauth/callback?code=abc&state={}",
        url::form_urlencoded::byte_serialize(signed_state.as_bytes()).collect::<String>()
    );
    let (status, body) = send(&app, "GET", &callback, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["persisted"], true);

    let (_, after) = send(&app, "GET", "/v1/session", None).await;
    assert_eq!(after["data"]["authenticated"], true);
}

#[tokio::test]
async fn callback_with_forged_state_rejected() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/oauth/callback?code=abc&state=forged", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_state");

    let (_, session) = send(&app, "GET", "/v1/session", None).await;
    assert_eq!(session["data"]["authenticated"], false);
}

#[tokio::test]
async fn body_battery_without_session_is_unauthorized() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/body-battery", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "authentication_required");
}

#[tokio::test]
async fn inverted_window_is_bad_request() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, _) = send(
        &app,
        "GET",
        "/v1/body-battery?start=2024-03-05&end=2024-03-01",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn default_window_before_calendar_floor_is_bad_request() {
    let server = MockServer::start().await;
    let app = app(&server);

    let uri = format!("/v1/body-battery?end={}", chrono::NaiveDate::MIN);
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn callback_without_state_connects() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/oauth/callback?code=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["authenticated"], true);
}

#[tokio::test]
async fn change_insight_over_fetched_data() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    // 2024-03-01T00:00:00Z
    let mar_1 = 1_709_251_200_i64;
    Mock::given(method("GET"))
        .and(path(STRESS_DETAILS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stressDetails": [
                { "startTimeInSeconds": mar_1, "timeOffsetBodyBatteryValues": { "0": 40, "60": 10 } },
                { "startTimeInSeconds": mar_1 + 86_400, "timeOffsetBodyBatteryValues": { "0": 60, "60": 20 } }
            ]
        })))
        .mount(&server)
        .await;
    let app = app(&server);

    let (status, _) = send(&app, "GET", "/v1/oauth/callback?code=abc", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        "/v1/body-battery?start=2024-03-01&end=2024-03-02",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["date"], "2024-03-01");

    let (status, created) = send(
        &app,
        "POST",
        "/v1/changes",
        Some(json!({ "type": "stop", "name": "Alcohol", "date": "2024-03-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["data"]["id"].is_string());

    let (_, latest) = send(&app, "GET", "/v1/changes/latest", None).await;
    assert_eq!(latest["data"]["name"], "Alcohol");

    let (status, insight) = send(&app, "GET", "/v1/insights", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(insight["data"]["title"], "Impact of stopping Alcohol");
    assert_eq!(insight["data"]["pre_change_averages"]["high"], 40);
    assert_eq!(insight["data"]["impact"]["high_percent"], 50);
    assert_eq!(insight["data"]["impact"]["low_percent"], 100);

    let (status, _) = send(&app, "DELETE", "/v1/session", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, session) = send(&app, "GET", "/v1/session", None).await;
    assert_eq!(session["data"]["authenticated"], false);
}

#[tokio::test]
async fn latest_change_missing_is_not_found() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, _) = send(&app, "GET", "/v1/changes/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/v1/insights", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn suggestions_by_kind() {
    let server = MockServer::start().await;
    let app = app(&server);

    let (status, body) = send(&app, "GET", "/v1/changes/suggestions?kind=start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .contains(&json!("Meditation")));
}
