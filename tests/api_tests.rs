mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bin_dispatch::models::AuthenticatedUser;
use bin_dispatch::routes::create_router;
use bin_dispatch::utils::jwt::generate_token;

use common::{driver, manager, Harness};

struct TestApp {
    router: Router,
    harness: Harness,
}

impl TestApp {
    fn new() -> Self {
        let harness = Harness::new();
        Self {
            router: create_router(harness.state.clone()),
            harness,
        }
    }

    fn token(&self, user: &AuthenticatedUser) -> String {
        generate_token(user.user_id, &user.email, user.role, &self.harness.state.jwt).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&AuthenticatedUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "bin_dispatch");
}

#[tokio::test]
async fn test_driver_routes_require_token() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/driver/shift", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let request = Request::builder()
        .uri("/api/driver/shift")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_manager_routes_reject_drivers() {
    let app = TestApp::new();
    let d = driver();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/manager/shifts",
            Some(&d),
            Some(json!({ "driver_id": d.user_id, "bin_ids": [Uuid::new_v4()] })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_shift_flow_over_http() {
    let app = TestApp::new();
    let d = driver();
    let boss = manager();
    let bin = app.harness.bin(45.51, -73.61, Some(30)).await;

    let (status, body) = app
        .send(Method::GET, "/api/driver/shift", Some(&d), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/manager/shifts",
            Some(&boss),
            Some(json!({ "driver_id": d.user_id, "bin_ids": [bin.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["shift"]["status"], "ready");
    let shift_id = body["data"]["shift"]["id"].as_str().unwrap().to_string();
    let waypoint_id = body["data"]["waypoints"][0]["id"].as_str().unwrap().to_string();

    // Sin GPS no se puede iniciar
    let (status, body) = app
        .send(Method::POST, "/api/driver/shift/start", Some(&d), None)
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "PRECONDITION_FAILED");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/driver/location",
            Some(&d),
            Some(json!({ "latitude": 45.50, "longitude": -73.60, "accuracy": 4.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/driver/shift/start", Some(&d), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["shift"]["status"], "active");
    assert_eq!(body["data"]["sequencing_mode"], "full_optimization");
    assert!(body["data"]["previous_shift"].is_null());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/driver/shift/complete",
            Some(&d),
            Some(json!({ "shift_bin_id": waypoint_id, "updated_fill_percentage": 150 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let complete = json!({ "shift_bin_id": waypoint_id, "updated_fill_percentage": 75 });
    let (status, body) = app
        .send(Method::POST, "/api/driver/shift/complete", Some(&d), Some(complete.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"]["completed"], 1);
    assert_eq!(body["data"]["progress"]["total"], 1);

    let (status, body) = app
        .send(Method::POST, "/api/driver/shift/complete", Some(&d), Some(complete))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = app
        .send(Method::GET, &format!("/api/manager/shifts/{}", shift_id), Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["waypoints"][0]["is_completed"], true);

    let (status, body) = app
        .send(Method::POST, "/api/driver/shift/end", Some(&d), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["end_reason"], "completed");
    assert_eq!(body["data"]["shift"]["status"], "ended");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/manager/shifts/{}/cancel", shift_id),
            Some(&boss),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let app = TestApp::new();
    let d = driver();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/driver/shift/complete")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(&d)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_unknown_shift_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/manager/shifts/{}/cancel", Uuid::new_v4()),
            Some(&manager()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_pause_without_active_shift() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::POST, "/api/driver/shift/pause", Some(&driver()), None)
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}
