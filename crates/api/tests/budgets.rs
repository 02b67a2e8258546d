//! Integration tests for budget accounts.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, put_json, PROMPT};
use serde_json::json;

#[tokio::test]
async fn new_account_opens_with_default_limit() {
    let app = build_test_app();
    let response = get(&app, "/api/v1/budgets/9").await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["user_id"], 9);
    assert_eq!(data["limit"], 1.0);
    assert_eq!(data["used"], 0.0);
    assert_eq!(data["remaining"], 1.0);
    assert_eq!(data["period_days"], 30);
    assert!(data["reset_at"].is_string());
}

#[tokio::test]
async fn raising_the_limit_keeps_usage_and_admits_more() {
    let app = build_test_app();
    let submission = json!({
        "user_id": 2,
        "prompt": PROMPT,
        "duration": 8,
        "resolution": "1080p",
        "include_audio": false,
    });
    post_json(&app, "/api/v1/generations", submission.clone()).await;
    let rejected = post_json(&app, "/api/v1/generations", submission.clone()).await;
    assert_eq!(rejected.status(), StatusCode::PAYMENT_REQUIRED);

    let response = put_json(&app, "/api/v1/budgets/2", json!({ "limit": 2.5 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["limit"], 2.5);
    assert_eq!(data["used"], 0.75);
    assert_eq!(data["remaining"], 1.75);

    let admitted = post_json(&app, "/api/v1/generations", submission).await;
    assert_eq!(admitted.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn negative_limit_is_rejected() {
    let app = build_test_app();
    let response = put_json(&app, "/api/v1/budgets/2", json!({ "limit": -1 })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert_eq!(json["fields"][0]["field"], "limit");
}

#[tokio::test]
async fn missing_limit_is_rejected() {
    let app = build_test_app();
    let response = put_json(&app, "/api/v1/budgets/2", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
}
