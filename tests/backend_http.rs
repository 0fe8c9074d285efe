use std::net::SocketAddr;

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};

use career_mentor::backend::{ChatBackend, ChatRequest, HistoryEntry, HttpChatBackend};
use career_mentor::error::ChatError;
use career_mentor::persona::Persona;
use career_mentor::session::ChatMessage;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn request() -> ChatRequest {
    ChatRequest {
        message: "What skills does a UX designer need?".to_string(),
        conversation_history: vec![HistoryEntry::from(&ChatMessage::assistant(
            Persona::SkillBuilder,
            Persona::SkillBuilder.greeting(),
        ))],
        current_agent: Persona::SkillBuilder,
    }
}

#[tokio::test]
async fn test_successful_reply() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["current_agent"], "skill_builder");
            assert_eq!(body["conversation_history"].as_array().unwrap().len(), 1);
            Json(json!({
                "message": format!("Echo: {}", body["message"].as_str().unwrap()),
                "agent_personality": "skill_builder",
                "tools_used": ["skills_db"]
            }))
        }),
    );
    let addr = serve(app).await;

    let backend = HttpChatBackend::new(&format!("http://{addr}")).unwrap();
    let reply = backend.send(request()).await.unwrap();

    assert_eq!(reply.message, "Echo: What skills does a UX designer need?");
    assert_eq!(reply.persona(), Some(Persona::SkillBuilder));
    assert_eq!(reply.tools_used, vec!["skills_db".to_string()]);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let long_body = "x".repeat(2048);
    let app = Router::new().route(
        "/api/chat",
        post(move || {
            let body = long_body.clone();
            async move { (StatusCode::SERVICE_UNAVAILABLE, body) }
        }),
    );
    let addr = serve(app).await;

    let backend = HttpChatBackend::new(&format!("http://{addr}/")).unwrap();
    match backend.send(request()).await {
        Err(ChatError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), 512);
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_reply_is_an_error() {
    let app = Router::new().route("/api/chat", post(|| async { "not json" }));
    let addr = serve(app).await;

    let backend = HttpChatBackend::new(&format!("http://{addr}")).unwrap();
    assert!(matches!(
        backend.send(request()).await,
        Err(ChatError::Json(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend() {
    // bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpChatBackend::new(&format!("http://{addr}")).unwrap();
    assert!(matches!(
        backend.send(request()).await,
        Err(ChatError::Http(_))
    ));
}
