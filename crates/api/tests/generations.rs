//! Integration tests for submission, polling and listing.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, TestApp, PROMPT};
use serde_json::{json, Value};

fn submission(user_id: i64, request_id: Option<&str>) -> Value {
    let mut body = json!({
        "user_id": user_id,
        "prompt": PROMPT,
        "duration": 6,
        "resolution": "1080p",
        "include_audio": false,
    });
    if let Some(id) = request_id {
        body["request_id"] = json!(id);
    }
    body
}

async fn submit(app: &TestApp, body: Value) -> (StatusCode, Value) {
    let response = post_json(app, "/api/v1/generations", body).await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_201_with_queued_generation() {
    let app = build_test_app();
    let (status, json) = submit(&app, submission(1, None)).await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &json["data"];
    assert_eq!(data["status"], "queued");
    assert_eq!(data["estimated_cost"], 0.5);
    assert!(data["video_id"].is_i64());
    assert!(data["estimated_duration"].as_u64().unwrap() > 0);
    assert!(data["created_at"].is_string());
    // A request id is generated when the client sends none.
    assert_eq!(data["request_id"].as_str().unwrap().len(), 36);
    assert!(data["video_url"].is_null());
}

#[tokio::test]
async fn repeated_request_id_returns_existing_generation_with_200() {
    let app = build_test_app();
    let (first_status, first) = submit(&app, submission(1, Some("order-42"))).await;
    let (second_status, second) = submit(&app, submission(1, Some("order-42"))).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["data"]["video_id"], second["data"]["video_id"]);

    // Only one reservation was made.
    let budget = body_json(get(&app, "/api/v1/budgets/1").await).await;
    assert_eq!(budget["data"]["used"], 0.5);
}

#[tokio::test]
async fn request_id_owned_by_another_user_conflicts() {
    let app = build_test_app();
    submit(&app, submission(1, Some("shared"))).await;
    let (status, json) = submit(&app, submission(2, Some("shared"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn over_budget_submission_returns_402_with_shortfall() {
    let app = build_test_app();
    // 8s at 1080p costs $0.75 against a $1.00 limit.
    let mut body = submission(5, None);
    body["duration"] = json!(8);
    let (status, _) = submit(&app, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = submit(&app, body).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["code"], "INSUFFICIENT_BUDGET");
    assert_eq!(json["shortfall"], 0.5);

    let budget = body_json(get(&app, "/api/v1/budgets/5").await).await;
    assert_eq!(budget["data"]["used"], 0.75);
}

#[tokio::test]
async fn invalid_fields_are_reported_together() {
    let app = build_test_app();
    let mut body = submission(1, None);
    body["duration"] = json!(5);
    body["resolution"] = json!("4k");
    body["prompt"] = json!("too short");

    let (status, json) = submit(&app, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
    let fields: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"duration"));
    assert!(fields.contains(&"resolution"));
    assert!(fields.contains(&"prompt"));
}

#[tokio::test]
async fn malformed_body_is_invalid_request() {
    let app = build_test_app();
    let (status, json) = submit(&app, json!({ "user_id": "not a number" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

// ---------------------------------------------------------------------------
// Polling and listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_generation_returns_404() {
    let app = build_test_app();
    let response = get(&app, "/api/v1/generations/9999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn non_numeric_generation_id_is_bad_request() {
    let app = build_test_app();
    let response = get(&app, "/api/v1/generations/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn processed_generation_reports_video_url_and_cost() {
    let app = build_test_app();
    let (_, created) = submit(&app, submission(3, None)).await;
    let id = created["data"]["video_id"].as_i64().unwrap();

    app.run_worker().await;

    let response = get(&app, &format!("/api/v1/generations/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "completed");
    assert_eq!(
        data["video_url"],
        format!("https://cdn.test/generations/{id}.mp4")
    );
    assert_eq!(data["actual_cost"], 0.5);
    assert_eq!(data["attempt_count"], 1);
    assert!(data["completed_at"].is_string());
}

#[tokio::test]
async fn list_is_scoped_to_user_and_newest_first() {
    let app = build_test_app();
    let (_, a) = submit(&app, submission(7, Some("a"))).await;
    let (_, b) = submit(&app, submission(7, Some("b"))).await;
    submit(&app, submission(8, Some("c"))).await;

    let response = get(&app, "/api/v1/generations?user_id=7").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["video_id"].as_i64().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            b["data"]["video_id"].as_i64().unwrap(),
            a["data"]["video_id"].as_i64().unwrap()
        ]
    );

    let limited = body_json(get(&app, "/api/v1/generations?user_id=7&limit=1").await).await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_requires_user_id() {
    let app = build_test_app();
    let response = get(&app, "/api/v1/generations").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_REQUEST");
}
