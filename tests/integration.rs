use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_dispatch::api::rest::router;
use delivery_dispatch::config::Config;
use delivery_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const PICKUP: (f64, f64) = (14.5995, 120.9842);
const DELIVERY: (f64, f64) = (14.6042, 120.9822);

fn setup() -> axum::Router {
    let state = AppState::new(&Config::default()).unwrap();
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn point((lat, lng): (f64, f64)) -> Value {
    json!({ "lat": lat, "lng": lng })
}

fn actor(role: &str) -> Value {
    json!({ "id": Uuid::new_v4(), "role": role })
}

async fn create_driver(app: &axum::Router, name: &str, location: (f64, f64)) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "name": name, "location": point(location) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &axum::Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "customer_id": Uuid::new_v4(),
                "vendor_id": Uuid::new_v4(),
                "pickup": { "location": point(PICKUP), "text": "Binondo" },
                "delivery": { "location": point(DELIVERY), "text": "Quiapo" },
                "subtotal_cents": 35_050
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn transition(app: &axum::Router, order_id: &str, status: &str, role: &str) -> StatusCode {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/transitions"),
            json!({ "status": status, "actor": actor(role) }),
        ))
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("dispatch_conflicts_total"));
}

#[tokio::test]
async fn validate_reports_serviceability() {
    let app = setup();

    let inside = app
        .clone()
        .oneshot(get_request("/geo/validate?lat=14.5995&lng=120.9842"))
        .await
        .unwrap();
    assert_eq!(inside.status(), StatusCode::OK);
    assert_eq!(body_json(inside).await["serviceable"], true);

    let tokyo = app
        .clone()
        .oneshot(get_request("/geo/validate?lat=35.68&lng=139.69"))
        .await
        .unwrap();
    assert_eq!(body_json(tokyo).await["serviceable"], false);

    let malformed = app
        .oneshot(get_request("/geo/validate?lat=95.0&lng=120.0"))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(malformed).await["code"], "invalid_coordinate");
}

#[tokio::test]
async fn distance_outside_region_is_422() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/distance",
            json!({ "origin": point(PICKUP), "destination": point((35.68, 139.69)) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "out_of_service_area");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn quote_without_provider_is_estimated() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/quotes",
            json!({ "origin": point(PICKUP), "destination": point(DELIVERY), "radius_km": 5.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["estimated"], true);
    assert_eq!(body["within_service_radius"], true);
    assert_eq!(body["fee_cents"], 4_900);
    assert!(body["eta_minutes"].as_u64().unwrap() >= 15);
}

#[tokio::test]
async fn matrix_over_limit_is_400() {
    let app = setup();
    let destinations: Vec<Value> = (0..26)
        .map(|i| point((14.5 + i as f64 * 0.001, 121.0)))
        .collect();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/distance/matrix",
            json!({ "origin": point(PICKUP), "destinations": destinations }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "limit_exceeded");

    let response = app
        .oneshot(json_request(
            "POST",
            "/distance/matrix",
            json!({ "origin": point(PICKUP), "destinations": &destinations[..25] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["results"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn route_with_nine_waypoints_is_400() {
    let app = setup();
    let waypoints: Vec<Value> = (1..=9)
        .map(|i| point((14.5 + i as f64 * 0.005, 121.0)))
        .collect();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/routes",
            json!({ "origin": point(PICKUP), "destination": point(DELIVERY), "waypoints": waypoints }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            "/routes",
            json!({ "origin": point(PICKUP), "destination": point(DELIVERY), "waypoints": &waypoints[..2] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["legs"].as_array().unwrap().len(), 3);
    assert_eq!(body["fallback"], true);
    assert!(!body["polyline"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn optimize_orders_stops_nearest_first() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/routes/optimize",
            json!({
                "origin": point((14.50, 121.00)),
                "stops": [point((14.53, 121.00)), point((14.51, 121.00)), point((14.52, 121.00))],
                "return_to_origin": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let order: Vec<u64> = body["stops"]
        .as_array()
        .unwrap()
        .iter()
        .map(|stop| stop["index"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert_eq!(body["legs"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn create_order_prices_and_reconciles() {
    let app = setup();
    let order = create_order(&app).await;

    assert_eq!(order["status"], "pending");
    assert!(order["driver_id"].is_null());
    assert!(order["timeline"]["ordered"].is_string());

    let pricing = &order["pricing"];
    let earnings = &order["earnings"];
    let total = pricing["total"].as_i64().unwrap();
    let tax = pricing["tax"].as_i64().unwrap();
    let split = earnings["vendor_earnings"].as_i64().unwrap()
        + earnings["driver_earnings"].as_i64().unwrap()
        + earnings["platform_commission"].as_i64().unwrap();
    assert_eq!(split, total - tax);
    assert_eq!(earnings["driver_earnings"], pricing["delivery_fee"]);

    let id = order["id"].as_str().unwrap();
    let response = app
        .oneshot(get_request(&format!("/orders/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], order["id"]);
}

#[tokio::test]
async fn order_beyond_radius_is_rejected() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "customer_id": Uuid::new_v4(),
                "vendor_id": Uuid::new_v4(),
                "pickup": { "location": point(PICKUP), "text": "Binondo" },
                "delivery": { "location": point((14.5869, 121.1761)), "text": "Antipolo" },
                "subtotal_cents": 10_000,
                "radius_km": 5.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_unknown_order_returns_404() {
    let app = setup();
    let response = app
        .oneshot(get_request(&format!("/orders/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn skipping_states_is_409_and_customers_may_only_cancel() {
    let app = setup();
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    assert_eq!(transition(&app, id, "ready", "vendor").await, StatusCode::CONFLICT);
    assert_eq!(transition(&app, id, "confirmed", "customer").await, StatusCode::FORBIDDEN);
    assert_eq!(transition(&app, id, "confirmed", "vendor").await, StatusCode::OK);
    assert_eq!(transition(&app, id, "cancelled", "customer").await, StatusCode::OK);
    assert_eq!(transition(&app, id, "preparing", "vendor").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn repeated_transition_is_a_no_op() {
    let app = setup();
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    let first = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/transitions"),
            json!({ "status": "confirmed", "actor": actor("vendor") }),
        ))
        .await
        .unwrap();
    let first = body_json(first).await;
    assert_eq!(first["changed"], true);

    let second = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/transitions"),
            json!({ "status": "confirmed", "actor": actor("vendor") }),
        ))
        .await
        .unwrap();
    let second = body_json(second).await;
    assert_eq!(second["changed"], false);
    assert_eq!(second["stamped_at"], first["stamped_at"]);
}

#[tokio::test]
async fn picked_up_cancel_needs_admin_with_reason() {
    let app = setup();
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    for status in ["confirmed", "preparing", "ready", "picked_up"] {
        assert_eq!(transition(&app, id, status, "vendor").await, StatusCode::OK);
    }

    assert_eq!(transition(&app, id, "cancelled", "vendor").await, StatusCode::FORBIDDEN);
    assert_eq!(transition(&app, id, "cancelled", "admin").await, StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/transitions"),
            json!({ "status": "cancelled", "actor": actor("admin"), "reason": "rider accident" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["order"]["status"], "cancelled");
    assert_eq!(body["order"]["cancellation_reason"], "rider accident");
}

#[tokio::test]
async fn declines_walk_the_candidate_queue_until_exhausted() {
    let app = setup();
    let near = create_driver(&app, "Near", (14.5996, 120.9843)).await;
    let far = create_driver(&app, "Far", (14.6200, 121.0000)).await;
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/assign"),
            json!({ "candidate_driver_ids": [far, near] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let offer = body_json(response).await;
    assert_eq!(offer["driver_id"], near.as_str());
    assert_eq!(offer["status"], "offered");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{}/respond", offer["id"].as_str().unwrap()),
            json!({ "accept": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["outcome"], "reoffered");
    assert_eq!(outcome["offer"]["driver_id"], far.as_str());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{}/respond", outcome["offer"]["id"].as_str().unwrap()),
            json!({ "accept": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "no_driver_available");

    let response = app
        .oneshot(get_request(&format!("/orders/{id}/assignments")))
        .await
        .unwrap();
    let history = body_json(response).await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["declined", "declined"]);
}

#[tokio::test]
async fn accepted_driver_is_busy_until_delivery() {
    let app = setup();
    let driver = create_driver(&app, "Rider", (14.5996, 120.9843)).await;
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/assign"),
            json!({ "candidate_driver_ids": [driver] }),
        ))
        .await
        .unwrap();
    let offer = body_json(response).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{}/respond", offer["id"].as_str().unwrap()),
            json!({ "accept": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outcome"], "accepted");

    let response = app.clone().oneshot(get_request("/drivers")).await.unwrap();
    assert_eq!(body_json(response).await[0]["status"], "Busy");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["driver_id"], driver.as_str());
    assert_eq!(body["status"], "pending");

    for status in ["confirmed", "preparing", "ready", "picked_up", "delivered"] {
        assert_eq!(transition(&app, id, status, "driver").await, StatusCode::OK);
    }

    let response = app.clone().oneshot(get_request("/drivers")).await.unwrap();
    assert_eq!(body_json(response).await[0]["status"], "Available");

    let response = app
        .oneshot(get_request(&format!("/orders/{id}/assignments")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await[0]["status"], "completed");
}

#[tokio::test]
async fn cancelling_frees_the_accepted_driver() {
    let app = setup();
    let driver = create_driver(&app, "Rider", (14.5996, 120.9843)).await;
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/assign"),
            json!({ "candidate_driver_ids": [driver] }),
        ))
        .await
        .unwrap();
    let offer = body_json(response).await;
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{}/respond", offer["id"].as_str().unwrap()),
            json!({ "accept": true }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/transitions"),
            json!({ "status": "cancelled", "actor": actor("customer"), "reason": "too slow" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["closed_assignments"][0]["status"], "revoked");

    let response = app.clone().oneshot(get_request("/drivers")).await.unwrap();
    assert_eq!(body_json(response).await[0]["status"], "Available");

    let next = create_order(&app).await;
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{}/assign", next["id"].as_str().unwrap()),
            json!({ "candidate_driver_ids": [driver] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn assign_without_available_drivers_is_503() {
    let app = setup();
    let driver = create_driver(&app, "Resting", (14.5996, 120.9843)).await;
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver}/status"),
            json!({ "status": "Offline" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = create_order(&app).await;
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{}/assign", order["id"].as_str().unwrap()),
            json!({ "candidate_driver_ids": [driver] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn reassign_requires_admin() {
    let app = setup();
    let first = create_driver(&app, "First", (14.5996, 120.9843)).await;
    let second = create_driver(&app, "Second", (14.6010, 120.9850)).await;
    let order = create_order(&app).await;
    let id = order["id"].as_str().unwrap();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/assign"),
            json!({ "candidate_driver_ids": [first] }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/reassign"),
            json!({ "driver_id": second, "actor": actor("vendor") }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/reassign"),
            json!({ "driver_id": second, "actor": actor("admin") }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let assignment = body_json(response).await;
    assert_eq!(assignment["status"], "accepted");
    assert_eq!(assignment["driver_id"], second.as_str());

    let response = app
        .oneshot(get_request(&format!("/orders/{id}/assignments")))
        .await
        .unwrap();
    let history = body_json(response).await;
    assert_eq!(history[0]["status"], "revoked");
    assert_eq!(history[1]["status"], "accepted");
}

#[tokio::test]
async fn second_assign_while_offer_open_is_409() {
    let app = setup();
    let driver = create_driver(&app, "Rider", (14.5996, 120.9843)).await;
    let order = create_order(&app).await;
    let uri = format!("/orders/{}/assign", order["id"].as_str().unwrap());

    let first = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({ "candidate_driver_ids": [driver] })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(json_request("POST", &uri, json!({ "candidate_driver_ids": [driver] })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["code"], "assignment_conflict");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn driver_endpoints_validate_input() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "name": "  ", "location": point(PICKUP) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let driver = create_driver(&app, "Mover", PICKUP).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver}/location"),
            json!({ "location": point((14.61, 120.99)) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["location"]["lat"], 14.61);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver}/location"),
            json!({ "location": point((14.61, 200.0)) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{}/status", Uuid::new_v4()),
            json!({ "status": "Busy" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
