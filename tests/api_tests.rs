use ai_receptionist::config::RelayConfig;
use ai_receptionist::message::{ChatResponse, ErrorResponse, HealthResponse};
use ai_receptionist::routes::create_router;
use ai_receptionist::services::completion::{CompletionClient, CompletionError};
use ai_receptionist::state::AppState;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response, StatusCode, header};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

enum Upstream {
    Reply(&'static str),
    NoReply,
    Fail,
}

struct StubCompletion {
    upstream: Upstream,
    prompts: Mutex<Vec<String>>,
}

impl StubCompletion {
    fn new(upstream: Upstream) -> Arc<Self> {
        Arc::new(Self {
            upstream,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.upstream {
            Upstream::Reply(reply) => Ok(Some(reply.to_string())),
            Upstream::NoReply => Ok(None),
            Upstream::Fail => Err(CompletionError::Status {
                status: 401,
                body: "invalid api key sk-live-1234".to_string(),
            }),
        }
    }
}

fn build_app(config: &RelayConfig, stub: Arc<StubCompletion>) -> Router {
    let state = Arc::new(AppState::new(config, stub));
    create_router(state).layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app(&RelayConfig::with_api_key("test"), StubCompletion::new(Upstream::NoReply));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = read_json(response).await;
    assert!(health.ok);
    assert!(health.ts > 1_600_000_000_000, "ts should be epoch millis, got {}", health.ts);
}

#[tokio::test]
async fn test_chat_endpoint() {
    let stub = StubCompletion::new(Upstream::Reply("Hello! How can I help?"));
    let app = build_app(&RelayConfig::with_api_key("test"), stub.clone());

    let response = app
        .oneshot(chat_request(r#"{"message": "  hello there  ", "businessId": "demo"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = read_json(response).await;
    assert_eq!(chat.reply, "Hello! How can I help?");
    assert_eq!(stub.prompts(), vec!["hello there".to_string()]);
}

#[tokio::test]
async fn test_missing_or_blank_message_is_rejected() {
    let stub = StubCompletion::new(Upstream::Reply("unused"));
    let app = build_app(&RelayConfig::with_api_key("test"), stub.clone());

    for body in [r#"{}"#, r#"{"message": "   "}"#, r#"{"message": null}"#, r#"{"message": 42}"#] {
        let response = app.clone().oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: ErrorResponse = read_json(response).await;
        assert_eq!(err.error, "Message is required");
    }

    // Without a JSON content type the body is never parsed.
    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .body(Body::from("message=hello"))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ErrorResponse = read_json(response).await;
    assert_eq!(err.error, "Message is required");

    let response = app.oneshot(chat_request(r#"{"message": "#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ErrorResponse = read_json(response).await;
    assert_eq!(err.error, "Invalid JSON body");

    assert!(stub.prompts().is_empty(), "upstream must not be called");
}

#[tokio::test]
async fn test_upstream_failure_is_generic() {
    let app = build_app(&RelayConfig::with_api_key("test"), StubCompletion::new(Upstream::Fail));

    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body_bytes.to_vec()).unwrap();
    assert!(!text.contains("sk-live"), "upstream detail leaked: {text}");
    let err: ErrorResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(err.error, "Something went wrong");
}

#[tokio::test]
async fn test_empty_completion_uses_fallback() {
    let app = build_app(&RelayConfig::with_api_key("test"), StubCompletion::new(Upstream::NoReply));

    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = read_json(response).await;
    assert_eq!(chat.reply, "Sorry, I didn't catch that.");
}

#[tokio::test]
async fn test_origin_allow_list() {
    let stub = StubCompletion::new(Upstream::Reply("ok"));
    let app = build_app(&RelayConfig::with_api_key("test"), stub.clone());

    // Unknown origin never reaches the handler.
    let mut req = chat_request(r#"{"message": "hi"}"#);
    req.headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert!(stub.prompts().is_empty());

    // Allow-listed origin proceeds and gets CORS headers back.
    let mut req = chat_request(r#"{"message": "hi"}"#);
    req.headers_mut()
        .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

    // No origin at all: curl, uptime monitors.
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stub.prompts().len(), 2);
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let app = build_app(&RelayConfig::with_api_key("test"), StubCompletion::new(Upstream::NoReply));

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header(header::ORIGIN, "https://ai-chatbot-server-db6g.onrender.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://ai-chatbot-server-db6g.onrender.com"
    );
}

#[tokio::test]
async fn test_debug_flag_allows_any_origin() {
    let mut config = RelayConfig::with_api_key("test");
    config.debug_allow_any_origin = true;
    let app = build_app(&config, StubCompletion::new(Upstream::Reply("ok")));

    let mut req = chat_request(r#"{"message": "hi"}"#);
    req.headers_mut()
        .insert(header::ORIGIN, "https://anywhere.example".parse().unwrap());
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
}

#[tokio::test]
async fn test_rate_limit_integration() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 2;
    config.rate_limit_window = Duration::from_millis(300);
    let app = build_app(&config, StubCompletion::new(Upstream::Reply("ok")));

    for _ in 0..2 {
        let response = app.clone().oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    let err: ErrorResponse = read_json(response).await;
    assert_eq!(err.error, "Too many requests, please slow down.");

    // Health is never limited.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(350)).await;

    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_clients_are_limited_separately() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 1;
    config.trust_proxy = true;
    let app = build_app(&config, StubCompletion::new(Upstream::Reply("ok")));

    // The proxy appends the address it saw as the last entry.
    let from = |ip: &str| {
        let mut req = chat_request(r#"{"message": "hi"}"#);
        req.headers_mut()
            .insert("x-forwarded-for", format!("192.0.2.1, {ip}").parse().unwrap());
        req
    };

    let response = app.clone().oneshot(from("203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.clone().oneshot(from("203.0.113.8")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(from("203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_spoofed_forwarded_entries_do_not_bypass_limit() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 1;
    config.trust_proxy = true;
    let stub = StubCompletion::new(Upstream::Reply("ok"));
    let app = build_app(&config, stub.clone());

    let mut statuses = Vec::new();
    for i in 1..=5 {
        let mut req = chat_request(r#"{"message": "hi"}"#);
        let forwarded = format!("203.0.113.{i}, 198.51.100.9");
        req.headers_mut()
            .insert("x-forwarded-for", forwarded.parse().unwrap());
        statuses.push(app.clone().oneshot(req).await.unwrap().status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
    assert_eq!(stub.prompts().len(), 1);
}

#[tokio::test]
async fn test_forwarded_header_ignored_without_trust_proxy() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 1;
    let app = build_app(&config, StubCompletion::new(Upstream::Reply("ok")));

    let from = |ip: &str| {
        let mut req = chat_request(r#"{"message": "hi"}"#);
        req.headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        req
    };

    let response = app.clone().oneshot(from("203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Same peer address, so the header alone cannot buy another request.
    let response = app.oneshot(from("203.0.113.8")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_concurrent_burst_does_not_undercount() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 5;
    let stub = StubCompletion::new(Upstream::Reply("ok"));
    let app = build_app(&config, stub.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(chat_request(r#"{"message": "hi"}"#))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 5);
    assert_eq!(limited, 15);
    assert_eq!(stub.prompts().len(), 5);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let stub = StubCompletion::new(Upstream::Reply("unused"));
    let app = build_app(&RelayConfig::with_api_key("test"), stub.clone());

    let body = format!(r#"{{"message": "{}"}}"#, "a".repeat(200 * 1024));
    let response = app.oneshot(chat_request(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(stub.prompts().is_empty());
}

#[tokio::test]
async fn test_widget_loader_is_served() {
    let mut config = RelayConfig::with_api_key("test");
    config.rate_limit_max = 1;
    let app = build_app(&config, StubCompletion::new(Upstream::NoReply));

    // Static files sit outside the /chat rate limit.
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/widget.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.contains("javascript"), "{content_type}");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let script = String::from_utf8(body.to_vec()).unwrap();
        assert!(script.contains("document.currentScript"));
        assert!(script.contains("mount(script)"));
    }

    let response = app
        .oneshot(Request::builder().uri("/nope.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_dir_is_configurable() {
    let dir = std::env::temp_dir().join(format!("air-public-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("widget.js"), "/* custom build */").unwrap();

    let mut config = RelayConfig::with_api_key("test");
    config.public_dir = dir.clone();
    let app = build_app(&config, StubCompletion::new(Upstream::NoReply));

    let response = app
        .oneshot(Request::builder().uri("/widget.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"/* custom build */");

    std::fs::remove_dir_all(dir).unwrap();
}
