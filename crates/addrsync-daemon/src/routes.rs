//! Axum router and HTTP handlers for addrsync-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler builds a fresh `SyncSession`, so one
//! HTTP request is one sync session.

use std::{convert::Infallible, sync::Arc};

use addrsync_reconcile::{ExclusionSet, OrderId, SyncPolicy};
use addrsync_runtime::{
    collect_address_statistics, OrderStore, PolicyStore, SyncError, SyncOutcome, SyncSession,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        BulkBatchRequest, BulkBatchResponse, ErrorResponse, HealthResponse, OrderCreatedHook,
        OrderSavedHook, SyncResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

pub const TOKEN_HEADER: &str = "x-addrsync-token";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the application router wired to the given shared state.
///
/// CORS and tracing layers are attached by `main.rs`, so tests can drive
/// the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/orders/:order_id/sync", post(sync_single))
        .route("/v1/orders/:order_id/addresses", get(get_addresses))
        .route("/v1/bulk/batch", post(sync_bulk_batch))
        .route("/v1/policy", get(get_policy).post(set_policy))
        .route("/v1/statistics", get(statistics))
        .route("/v1/hooks/order-saved", post(hook_order_saved))
        .route("/v1/hooks/order-created", post(hook_order_created))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Reject with 403 when a token is configured and the header does not match.
fn authorize(st: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = st.api_token.as_deref() else {
        return Ok(());
    };
    let presented = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if presented == Some(expected) {
        return Ok(());
    }
    warn!("request rejected: missing or invalid {TOKEN_HEADER}");
    Err(error_response(StatusCode::FORBIDDEN, "permission denied"))
}

fn sync_failed(st: &AppState, err: &SyncError) -> Response {
    warn!(error = %err, "sync failed");
    st.log_line("ERROR", err.to_string());
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn outcome_response(outcome: &SyncOutcome) -> Response {
    (StatusCode::OK, Json(SyncResponse::from(outcome))).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:order_id/sync
// ---------------------------------------------------------------------------

/// Manual sync of one order. Runs regardless of `auto_sync_enabled`.
pub(crate) async fn sync_single(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    let mut session = SyncSession::new();
    match st
        .controller
        .sync(&mut session, order_id, &ExclusionSet::new())
        .await
    {
        Ok(outcome) => {
            if outcome.is_synced() {
                st.log_line("INFO", format!("order {order_id}: addresses synced"));
            }
            outcome_response(&outcome)
        }
        Err(err) => sync_failed(&st, &err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:order_id/addresses
// ---------------------------------------------------------------------------

pub(crate) async fn get_addresses(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    match st.controller.orders().get_addresses(order_id).await {
        Ok(Some(addresses)) => (StatusCode::OK, Json(addresses)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Order not found"),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/bulk/batch
// ---------------------------------------------------------------------------

/// One page of the bulk run. The caller loops on `offset` while `has_more`.
pub(crate) async fn sync_bulk_batch(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<BulkBatchRequest>>,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    let req = body.map(|Json(b)| b).unwrap_or_default();
    let mut session = SyncSession::new();
    match st.driver.run_batch(&mut session, req.offset, st.page_size).await {
        Ok(batch) => {
            info!(
                offset = req.offset,
                synced = batch.synced_count,
                failed = batch.failed_count,
                has_more = batch.has_more,
                "bulk/batch"
            );
            let _ = st.bus.send(BusMsg::Batch {
                offset: req.offset,
                synced: batch.synced_count,
                failed: batch.failed_count,
                has_more: batch.has_more,
            });
            (
                StatusCode::OK,
                Json(BulkBatchResponse {
                    synced: batch.synced_count,
                    failed: batch.failed_count,
                    has_more: batch.has_more,
                    offset: batch.next_offset,
                }),
            )
                .into_response()
        }
        Err(err) => sync_failed(&st, &err),
    }
}

// ---------------------------------------------------------------------------
// GET|POST /v1/policy
// ---------------------------------------------------------------------------

pub(crate) async fn get_policy(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    match st.controller.policy_store().get_policy().await {
        Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn set_policy(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(policy): Json<SyncPolicy>,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    match st.controller.policy_store().set_policy(policy.clone()).await {
        Ok(()) => {
            info!(
                auto_sync_enabled = policy.auto_sync_enabled,
                direction = %policy.direction,
                fields = policy.fields.len(),
                "policy updated"
            );
            st.log_line("INFO", "sync policy updated");
            (StatusCode::OK, Json(policy)).into_response()
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/statistics
// ---------------------------------------------------------------------------

pub(crate) async fn statistics(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    match collect_address_statistics(st.controller.orders().as_ref(), st.page_size).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => sync_failed(&st, &err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/hooks/order-saved  /v1/hooks/order-created
// ---------------------------------------------------------------------------

/// Host notification after an order edit form was saved.
pub(crate) async fn hook_order_saved(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(hook): Json<OrderSavedHook>,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    let mut session = SyncSession::new();
    match st
        .controller
        .on_order_saved(&mut session, hook.order_id, &hook.form)
        .await
    {
        Ok(outcome) => outcome_response(&outcome),
        Err(err) => sync_failed(&st, &err),
    }
}

/// Host notification after an order was created programmatically.
pub(crate) async fn hook_order_created(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(hook): Json<OrderCreatedHook>,
) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    let mut session = SyncSession::new();
    match st.controller.on_order_created(&mut session, hook.order_id).await {
        Ok(outcome) => outcome_response(&outcome),
        Err(err) => sync_failed(&st, &err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&st, &headers) {
        return denied;
    }

    let mut out = HeaderMap::new();
    out.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    out.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (out, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        let m = msg.ok()?; // lagged or closed
        let event_name = match &m {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Batch { .. } => "batch",
            BusMsg::LogLine { .. } => "log",
        };
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(event_name).data(data)))
    })
}
