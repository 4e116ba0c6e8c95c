//! Integration tests for the legions-server API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use legions_server::{create_router, ServerConfig, ServerState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ============================================================================
// FIXTURES
// ============================================================================

fn test_app() -> Router {
    let config = ServerConfig {
        bot_time_limit_ms: 20,
        ..ServerConfig::default()
    };
    create_router(Arc::new(ServerState::new(config)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

/// A started two-human game; returns its id and the player to act
async fn human_game(app: &Router) -> (String, String) {
    let (status, summary) = send(
        app,
        "POST",
        "/api/games",
        Some(json!({"players": ["alice", "bob"], "config": {"seed": 7}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = summary["id"].as_str().unwrap().to_string();
    let waiting = summary["waiting_on"].as_str().unwrap().to_string();
    (id, waiting)
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_status_endpoint() {
    let app = test_app();
    let (status, json) = send(&app, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["games"], 0);
}

#[tokio::test]
async fn test_create_and_list() {
    let app = test_app();
    let (id, waiting) = human_game(&app).await;
    assert!(waiting == "alice" || waiting == "bob");

    let (status, list) = send(&app, "GET", "/api/games", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["phase"], "Split");

    let (status, game) = send(&app, "GET", &format!("/api/games/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["players"].as_array().unwrap().len(), 2);
    assert_eq!(game["started"], true);
}

#[tokio::test]
async fn test_unknown_game_is_404() {
    let app = test_app();
    let (status, json) = send(&app, "GET", "/api/games/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_one_player_is_rejected() {
    let app = test_app();
    let (status, json) = send(&app, "POST", "/api/games", Some(json!({"players": ["solo"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_commands_are_checked() {
    let app = test_app();
    let (id, waiting) = human_game(&app).await;
    let other = if waiting == "alice" { "bob" } else { "alice" };
    let uri = format!("/api/games/{id}/commands");

    let (status, json) = send(&app, "POST", &uri, Some(json!({"player": other, "verb": "done_with_splits"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "out_of_turn");

    // The starting legion is still 8 high
    let (status, json) = send(&app, "POST", &uri, Some(json!({"player": waiting, "verb": "done_with_splits"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invariant_violation");
}

#[tokio::test]
async fn test_split_then_read_actions() {
    let app = test_app();
    let (id, waiting) = human_game(&app).await;
    let (_, game) = send(&app, "GET", &format!("/api/games/{id}"), None).await;
    let player = game["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == waiting.as_str())
        .unwrap()
        .clone();
    let parent = player["legions"].as_object().unwrap().keys().next().unwrap().clone();
    let child = player["markers"][0].as_str().unwrap().to_string();

    let (_, before) = send(&app, "GET", &format!("/api/games/{id}/actions"), None).await;
    let since = before["next"].as_u64().unwrap();

    let split = json!({
        "player": waiting,
        "verb": "split_legion",
        "parent": parent,
        "child": child,
        "keep": ["Titan", "Centaur", "Centaur", "Gargoyle"],
        "split": ["Angel", "Gargoyle", "Ogre", "Ogre"],
    });
    let (status, json) = send(&app, "POST", &format!("/api/games/{id}/commands"), Some(split)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let produced = json["actions"].as_array().unwrap().len();
    assert!(produced > 0);

    let (_, log) = send(&app, "GET", &format!("/api/games/{id}/actions?since={since}"), None).await;
    assert_eq!(log["actions"].as_array().unwrap().len(), produced);
    assert_eq!(log["actions"][0]["action"], "split_legion");

    let (status, moves) = send(&app, "GET", &format!("/api/games/{id}/legions/{child}/moves"), None).await;
    assert_eq!(status, StatusCode::OK);
    // No roll yet in the split phase, so nothing is reachable
    assert!(moves.as_array().is_some());
}

#[tokio::test]
async fn test_bot_game_moves_on_its_own() {
    let app = test_app();
    let (status, summary) = send(
        &app,
        "POST",
        "/api/games",
        Some(json!({"bots": 2, "config": {"seed": 11}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = summary["id"].as_str().unwrap().to_string();

    let mut turn = 1;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_, game) = send(&app, "GET", &format!("/api/games/{id}"), None).await;
        turn = game["turn"].as_u64().unwrap();
        if turn > 1 || game["over"] == true {
            break;
        }
    }
    assert!(turn > 1);
}
