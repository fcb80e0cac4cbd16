// tests/chat_api_tests.rs
//
// End-to-end tests for the /chat endpoints, driven through the router with a
// scripted provider mock.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use healthstake_backend::test_helpers::{spawn_app, MockAiClient};

async fn request_json(
    router: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn create_session_returns_distinct_ids() {
    let app = spawn_app(MockAiClient::new());

    let (status, first) = request_json(
        app.router.clone(),
        Method::POST,
        "/chat/session/create",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, second) = request_json(
        app.router,
        Method::POST,
        "/chat/session/create",
        Some(json!({"model": "gemini-2.5-pro"})),
    )
    .await;

    let first_id: Uuid = serde_json::from_value(first["chat_id"].clone()).unwrap();
    let second_id: Uuid = serde_json::from_value(second["chat_id"].clone()).unwrap();
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn message_without_chat_id_auto_creates_session() {
    let app = spawn_app(MockAiClient::new().with_response("Two dogs, noted!"));

    let (status, body) = request_json(
        app.router.clone(),
        Method::POST,
        "/chat/",
        Some(json!({"message": "I have 2 dogs."})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Two dogs, noted!");
    let chat_id = body["chat_id"].as_str().unwrap();

    let (status, history) = request_json(
        app.router,
        Method::GET,
        &format!("/chat/{chat_id}/history"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn conversation_context_grows_by_two_turns_per_message() {
    let app = spawn_app(
        MockAiClient::new().with_responses(vec![
            "Lovely, two dogs!",
            "Each dog has four paws, so eight in total.",
        ]),
    );

    let (_, first) = request_json(
        app.router.clone(),
        Method::POST,
        "/chat/",
        Some(json!({"message": "I have 2 dogs."})),
    )
    .await;
    let chat_id = first["chat_id"].as_str().unwrap().to_string();
    assert_eq!(first["history"].as_array().unwrap().len(), 2);

    let (_, second) = request_json(
        app.router.clone(),
        Method::POST,
        "/chat/",
        Some(json!({"message": "How many paws are in my house?", "chat_id": chat_id})),
    )
    .await;
    assert_eq!(second["chat_id"].as_str().unwrap(), chat_id);
    let history = second["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["text"], "I have 2 dogs.");
    assert_eq!(history[3]["role"], "model");
    assert_eq!(
        history[3]["text"],
        "Each dog has four paws, so eight in total."
    );
    assert_eq!(app.calls.exec_chat_calls(), 2);
}

#[tokio::test]
async fn include_history_false_omits_history() {
    let app = spawn_app(MockAiClient::new().with_response("Hi!"));

    let (_, body) = request_json(
        app.router,
        Method::POST,
        "/chat/?include_history=false",
        Some(json!({"message": "Good evening"})),
    )
    .await;
    assert_eq!(body["response"], "Hi!");
    assert!(body.get("history").is_none());
}

#[tokio::test]
async fn greeting_is_served_without_provider_call() {
    let app = spawn_app(MockAiClient::new().with_response("unused"));

    let (status, body) = request_json(
        app.router,
        Method::POST,
        "/chat/",
        Some(json!({"message": "hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("HealthStake"));
    assert_eq!(app.calls.exec_chat_calls(), 0);
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let app = spawn_app(MockAiClient::new());

    let (status, body) = request_json(
        app.router,
        Method::POST,
        "/chat/",
        Some(json!({"message": "", "chat_id": Uuid::new_v4()})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.calls.exec_chat_calls(), 0);
}

#[tokio::test]
async fn delete_session_then_history_is_not_found() {
    let app = spawn_app(MockAiClient::new());

    let (_, created) = request_json(
        app.router.clone(),
        Method::POST,
        "/chat/session/create",
        Some(json!({})),
    )
    .await;
    let chat_id = created["chat_id"].as_str().unwrap().to_string();

    let (status, deleted) = request_json(
        app.router.clone(),
        Method::DELETE,
        &format!("/chat/{chat_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(deleted["message"].as_str().unwrap().contains(&chat_id));

    let (status, body) = request_json(
        app.router.clone(),
        Method::GET,
        &format!("/chat/{chat_id}/history"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = request_json(
        app.router,
        Method::DELETE,
        &format!("/chat/{chat_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_chat_id_gets_a_fresh_session() {
    let app = spawn_app(MockAiClient::new().with_response("Welcome back."));

    let stale = Uuid::new_v4();
    let (status, body) = request_json(
        app.router,
        Method::POST,
        "/chat/",
        Some(json!({"message": "Good morning", "chat_id": stale})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["chat_id"].as_str().unwrap(), stale.to_string());
}
