// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the exercise catalog endpoints and list caching.

mod common;

use axum::http::StatusCode;
use common::{TestContext, user_token};
use serde_json::json;

#[tokio::test]
async fn test_create_exercise_validation_reports_all_errors() {
    let ctx = TestContext::new().await;
    let token = user_token("alice");

    let (status, body) = ctx
        .post("/api/exercises", &token, json!({ "type": "compound" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("name"), "{}", message);
    assert!(message.contains("bodyPart"), "{}", message);
    assert!(message.contains(','), "{}", message);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new().await;
    let token = user_token("alice");

    let (status, body) = ctx
        .send(
            axum::http::Method::POST,
            "/api/exercises",
            Some(&token),
            Some(json!("just a string")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_list_is_cached_and_invalidated_on_create() {
    let ctx = TestContext::new().await;
    let token = user_token("alice");
    ctx.create_exercise(&token, "Squat", "legs").await;

    let (status, first) = ctx.get("/api/exercises", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "api");
    assert_eq!(first["count"], 1);

    let (_, second) = ctx.get("/api/exercises", &token).await;
    assert_eq!(second["source"], "cache");
    assert_eq!(second["data"], first["data"]);

    ctx.create_exercise(&token, "Bench Press", "chest").await;

    let (_, third) = ctx.get("/api/exercises", &token).await;
    assert_eq!(third["source"], "api");
    assert_eq!(third["count"], 2);
}

#[tokio::test]
async fn test_exercises_are_owner_scoped() {
    let ctx = TestContext::new().await;
    let alice = user_token("alice");
    let bob = user_token("bob");
    let squat = ctx.create_exercise(&alice, "Squat", "legs").await;

    let (_, listing) = ctx.get("/api/exercises", &bob).await;
    assert_eq!(listing["count"], 0);

    let (status, body) = ctx.delete(&format!("/api/exercises/{}", squat), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Exercise not found");
}

#[tokio::test]
async fn test_grouped_by_body_part() {
    let ctx = TestContext::new().await;
    let token = user_token("alice");
    ctx.create_exercise(&token, "Squat", "legs").await;
    ctx.create_exercise(&token, "Lunge", "legs").await;
    ctx.create_exercise(&token, "Bench Press", "chest").await;

    let (status, body) = ctx.get("/api/exercises/grouped", &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "api");
    assert_eq!(body["data"]["legs"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["chest"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["chest"][0]["name"], "Bench Press");
}

#[tokio::test]
async fn test_delete_exercise_in_use_conflicts() {
    let ctx = TestContext::new().await;
    let token = user_token("alice");
    let squat = ctx.create_exercise(&token, "Squat", "legs").await;
    let lunge = ctx.create_exercise(&token, "Lunge", "legs").await;
    ctx.create_routine(&token, "Leg day", &[&squat]).await;

    let (status, body) = ctx.delete(&format!("/api/exercises/{}", squat), &token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = ctx.delete(&format!("/api/exercises/{}", lunge), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = ctx.delete(&format!("/api/exercises/{}", lunge), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
