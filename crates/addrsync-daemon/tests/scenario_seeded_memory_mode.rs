//! In-memory daemon mode seeded from a JSON order file.

use std::sync::Arc;

use addrsync_daemon::{
    routes,
    state::{seed_orders_from_json, AppState},
};
use addrsync_reconcile::SyncPolicy;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

const SEED: &str = r#"[
    {
        "order_id": 41,
        "status": "processing",
        "billing": { "first_name": "Omar", "city": "Alexandria", "postcode": "21500" }
    },
    { "order_id": 42, "status": "on-hold" }
]"#;

async fn post_empty(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).expect("body is not valid JSON"))
}

#[tokio::test]
async fn seeded_order_syncs_through_router() {
    let store = seed_orders_from_json(SEED).expect("seed parses");
    let state = Arc::new(AppState::in_memory(SyncPolicy::default(), store).with_page_size(10));

    let router = routes::build_router(Arc::clone(&state));
    let (status, json) = post_empty(router, "/v1/orders/41/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(
        json["fields"],
        serde_json::json!(["shipping_first_name", "shipping_city", "shipping_postcode"])
    );

    // An order seeded with no addresses has nothing to copy.
    let (status, json) = post_empty(routes::build_router(state), "/v1/orders/42/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
}

#[test]
fn seed_rejects_duplicate_order_ids() {
    let raw = r#"[{"order_id": 1, "status": "pending"}, {"order_id": 1, "status": "draft"}]"#;
    let err = seed_orders_from_json(raw).err().expect("duplicate must fail");
    assert!(err.to_string().contains("duplicate order_id 1"));
}

#[test]
fn seed_rejects_unknown_status() {
    let raw = r#"[{"order_id": 1, "status": "shipped"}]"#;
    assert!(seed_orders_from_json(raw).is_err());
}
