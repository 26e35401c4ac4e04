use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prep_api::config::Config;
use prep_api::llm_client::gemini::GeminiProvider;
use prep_api::llm_client::LlmClient;
use prep_api::rate_limit::RateLimitConfig;
use prep_api::routes::build_router;
use prep_api::state::AppState;

fn config(base_url: &str, api_enabled: bool, max_requests: usize) -> Config {
    Config {
        api_key: "test-key".into(),
        api_enabled,
        allowed_origins: vec!["*".into()],
        port: 0,
        rust_log: "warn".into(),
        provider_base_url: base_url.into(),
        model_default: "gemini-test".into(),
        model_fallback: "gemini-test-pro".into(),
        rate_limit: RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        },
    }
}

fn app(config: Config) -> Router {
    let provider = GeminiProvider::new(config.api_key.clone(), config.provider_base_url.clone()).unwrap();
    let llm = LlmClient::new(Arc::new(provider), config.llm_settings());
    build_router(AppState::new(llm, config))
}

fn action(client: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/gemini")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn validate_body() -> Value {
    json!({"action": "validate", "payload": {"uni": "서을대학교", "dept": "경제학부"}})
}

#[tokio::test]
async fn test_health() {
    let response = app(config("http://127.0.0.1:9", true, 10))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_disabled_api_answers_503() {
    let response = app(config("http://127.0.0.1:9", false, 10))
        .oneshot(action("10.0.0.1", validate_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await["error"]["message"],
        "Server is currently closed by admin."
    );
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let response = app(config("http://127.0.0.1:9", true, 10))
        .oneshot(action("10.0.0.1", json!({"action": "summon", "payload": {}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["message"], "Invalid action");
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = app(config("http://127.0.0.1:9", true, 1));
    let bad = json!({"action": "summon"});

    let first = app.clone().oneshot(action("10.0.0.1", bad.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app.clone().oneshot(action("10.0.0.1", bad.clone())).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));

    let other = app.oneshot(action("10.0.0.2", bad)).await.unwrap();
    assert_eq!(other.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_preflight_is_ok_with_cors_headers() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/gemini")
        .header(header::ORIGIN, "https://prep.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app(config("http://127.0.0.1:9", true, 10)).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_validate_reports_typo() {
    let server = MockServer::start().await;
    let answer = r#"검색 결과입니다.
```json
{"isValid": true, "isTypo": true, "correctedUniversity": "서울대학교", "message": "혹시 서울대학교를 찾으셨나요?"}
```"#;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": answer}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(config(&server.uri(), true, 10))
        .oneshot(action("10.0.0.1", validate_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["isValid"], true);
    assert_eq!(body["isTypo"], true);
    assert_eq!(body["correctedUniversity"], "서울대학교");
}

#[tokio::test]
async fn test_validate_fails_open_when_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "bad key"}})))
        .mount(&server)
        .await;

    let response = app(config(&server.uri(), true, 10))
        .oneshot(action("10.0.0.1", validate_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["isValid"], true);
    assert_eq!(body["isTypo"], false);
}
