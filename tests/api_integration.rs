//! HTTP surface tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vehicle_digest_service::config::Settings;
use vehicle_digest_service::notification::{MemoryNotificationStore, NotificationStore};
use vehicle_digest_service::provider::{ChannelFactory, ProviderRegistry};
use vehicle_digest_service::server::{create_app, AppState};

fn test_state() -> AppState {
    let mut settings = Settings::default();
    settings.digest.interval_seconds = 3600;

    let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
    let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
    AppState::with_components(settings, store, registry).unwrap()
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_notification(app: Router, message: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/notifications",
        Some(json!({
            "kind": "maintenanceDue",
            "subjectRef": "vehicle-3",
            "message": message
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_reports_store_and_scheduler() {
    let app = create_app(test_state());
    let (status, body) = send(app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["scheduler"]["phase"], "idle");
}

#[tokio::test]
async fn notification_lifecycle() {
    let app = create_app(test_state());

    let created = create_notification(app.clone(), "Service due at 10,000 km").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["kind"], "maintenanceDue");
    assert!(created["readAt"].is_null());

    let (status, body) = send(app.clone(), Method::GET, "/api/v1/notifications/unread", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let uri = format!("/api/v1/notifications/{}/read", id);
    let (status, first) = send(app.clone(), Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send(app.clone(), Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["readAt"], second["readAt"]);

    let (_, body) = send(app, Method::GET, "/api/v1/notifications/unread?limit=10", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn unknown_notification_is_404() {
    let app = create_app(test_state());
    let (status, body) = send(app, Method::POST, "/api/v1/notifications/nope/read", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = create_app(test_state());
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/notifications",
        Some(json!({ "kind": "general", "message": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn trigger_without_providers_reports_failed_run() {
    let app = create_app(test_state());
    create_notification(app.clone(), "Insurance expires in 7 days").await;

    let (status, body) = send(app.clone(), Method::POST, "/api/v1/digest/trigger", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["notificationCount"], 1);
    assert_eq!(body["error"], "no providers configured");

    let (_, status_body) = send(app, Method::GET, "/api/v1/digest/status", None).await;
    assert_eq!(status_body["runsCompleted"], 1);
    assert_eq!(status_body["lastRun"]["trigger"], "manual");
}

#[tokio::test]
async fn trigger_with_email_provider_retires_notifications() {
    let app = create_app(test_state());

    let (status, provider) = send(
        app.clone(),
        Method::PUT,
        "/api/v1/providers/owner-email",
        Some(json!({
            "name": "Owner email",
            "type": "email",
            "config": { "to": ["owner@example.com"] },
            "isDefault": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider["isEnabled"], true);

    create_notification(app.clone(), "PUCC expires tomorrow").await;

    let (status, body) = send(app.clone(), Method::POST, "/api/v1/digest/trigger", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["run"]["retiredCount"], 1);
    assert_eq!(body["run"]["perProviderResult"]["owner-email"]["success"], true);

    let (_, unread) = send(app, Method::GET, "/api/v1/notifications/unread", None).await;
    assert_eq!(unread["total"], 0);
}

#[tokio::test]
async fn provider_validation() {
    let app = create_app(test_state());

    // Email channel without recipients
    let (status, _) = send(
        app.clone(),
        Method::PUT,
        "/api/v1/providers/broken",
        Some(json!({ "name": "Broken", "type": "email", "config": { "to": [] } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let sms = json!({
        "name": "SMS",
        "type": "sms",
        "config": { "phoneNumbers": ["+15550100"] },
        "isDefault": true
    });
    let (status, _) = send(app.clone(), Method::PUT, "/api/v1/providers/sms-1", Some(sms.clone())).await;
    assert_eq!(status, StatusCode::OK);

    // Second default of the same type
    let (status, body) = send(app.clone(), Method::PUT, "/api/v1/providers/sms-2", Some(sms)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, list) = send(app.clone(), Method::GET, "/api/v1/providers", None).await;
    assert_eq!(list["total"], 1);

    let (status, _) = send(app.clone(), Method::DELETE, "/api/v1/providers/sms-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(app, Method::DELETE, "/api/v1/providers/sms-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_requires_running_scheduler() {
    let app = create_app(test_state());
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/digest/reload",
        Some(json!({ "intervalSeconds": 60 })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn reload_rearms_running_scheduler() {
    let state = test_state();
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = state.scheduler.spawn(shutdown_rx);
    let app = create_app(state);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/v1/digest/reload",
        Some(json!({ "cron": "0 0 8 * * * *" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cadence"], "cron(0 0 8 * * * *)");
    assert!(body["nextRunAt"].is_string());

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/v1/digest/reload",
        Some(json!({ "cron": "whenever" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Cadences that can never fire are not accepted
    for request in [
        json!({ "cron": "0 0 0 1 1 * 2020" }),
        json!({ "intervalSeconds": u64::MAX }),
    ] {
        let (status, body) =
            send(app.clone(), Method::POST, "/api/v1/digest/reload", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let (_, status_body) = send(app, Method::GET, "/api/v1/digest/status", None).await;
    assert_eq!(status_body["cadence"], "cron(0 0 8 * * * *)");
    assert!(status_body["nextRunAt"].is_string());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn metrics_endpoint_serves_text() {
    let app = create_app(test_state());
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("vehicle_digest_notifications_stored"));
}
