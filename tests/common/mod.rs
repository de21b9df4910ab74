#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn serve_with_connect_info(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Stand-in for the completion API. Each path prefix is one upstream behaviour.
pub fn fake_completion_api() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(echo))
        .route("/empty/chat/completions", post(|| async { Json(json!({ "choices": [] })) }))
        .route(
            "/denied/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided" } })),
                )
            }),
        )
        .route(
            "/garbage/chat/completions",
            post(|| async { (StatusCode::OK, "<html>upstream proxy error</html>") }),
        )
        .route(
            "/slow/chat/completions",
            post(|headers: HeaderMap, body: Json<Value>| async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                echo(headers, body).await
            }),
        )
}

/// Replies with `model|authorization|turns|role|content` so tests can see what was sent.
async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let model = body["model"].as_str().unwrap_or("");
    let turns = body["messages"].as_array().map(Vec::len).unwrap_or(0);
    let role = body["messages"][0]["role"].as_str().unwrap_or("");
    let content = body["messages"][0]["content"].as_str().unwrap_or("");

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": format!("{model}|{auth}|{turns}|{role}|{content}")
            },
            "finish_reason": "stop"
        }]
    }))
}
