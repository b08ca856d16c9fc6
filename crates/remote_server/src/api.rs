//! HTTP API for the two long-poll endpoints.
//!
//! Routes (any method; fields come from the query string or a urlencoded
//! form body, the body winning when both carry a field):
//!
//!   /frex/remote        `cmds` = JSON array of commands
//!                       → JSON array of callback events
//!   /frex/remote/event  `ts` = cursor, `on` = JSON array of subscriptions
//!                       → `{ts, events}`, once, within the poll timeout
//!
//! Malformed fields answer 400 and a full session table answers 503. Item
//! failures inside a well-formed request never change the status.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Form, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use remote_bridge::Bridge;
use remote_core::{CallbackEvent, Cursor, EventBatch, RemoteError, RequestContext, codec};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Command endpoint path.
pub const COMMANDS_ROUTE: &str = "/frex/remote";

/// Subscription endpoint path.
pub const EVENTS_ROUTE: &str = "/frex/remote/event";

#[derive(Clone)]
struct AppState {
    bridge: Arc<Bridge>,
}

/// Build the router serving both endpoints over `bridge`.
pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route(COMMANDS_ROUTE, any(commands))
        .route(EVENTS_ROUTE, any(events))
        .with_state(AppState { bridge })
}

// ── Request / Response types ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct CommandParams {
    #[serde(default)]
    cmds: Option<String>,
}

impl CommandParams {
    fn merge(self, body: Option<Self>) -> Self {
        let body = body.unwrap_or_default();
        Self {
            cmds: body.cmds.or(self.cmds),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventParams {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    on: Option<String>,
}

impl EventParams {
    fn merge(self, body: Option<Self>) -> Self {
        let body = body.unwrap_or_default();
        Self {
            ts: body.ts.or(self.ts),
            on: body.on.or(self.on),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn error_response(ctx: &RequestContext, err: RemoteError) -> Response {
    let status = match err {
        RemoteError::MalformedRequest(_) | RemoteError::Json(_) => StatusCode::BAD_REQUEST,
        RemoteError::SessionLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(request_id = %ctx.request_id, %status, error = %err, "request rejected");
    } else {
        debug!(request_id = %ctx.request_id, %status, error = %err, "request rejected");
    }
    (
        status,
        Json(ApiError {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn request_context(peer: Option<SocketAddr>, headers: &HeaderMap) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(peer) = peer {
        ctx = ctx.with_peer(peer);
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    ctx
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn commands(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<CommandParams>,
    body: Option<Form<CommandParams>>,
) -> Response {
    let params = query.merge(body.map(|Form(params)| params));
    let ctx = request_context(peer.map(|ConnectInfo(addr)| addr), &headers);
    match run_commands(&state.bridge, params, &ctx).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => error_response(&ctx, e),
    }
}

async fn events(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<EventParams>,
    body: Option<Form<EventParams>>,
) -> Response {
    let params = query.merge(body.map(|Form(params)| params));
    let ctx = request_context(peer.map(|ConnectInfo(addr)| addr), &headers);
    match run_poll(&state.bridge, params, &ctx).await {
        Ok(Some(batch)) => Json(batch).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&ctx, e),
    }
}

async fn run_commands(
    bridge: &Bridge,
    params: CommandParams,
    ctx: &RequestContext,
) -> Result<Vec<CallbackEvent>, RemoteError> {
    let commands = codec::decode_list(params.cmds.as_deref().unwrap_or_default())?;
    Ok(bridge.process_commands(commands, ctx).await)
}

/// Run one poll. A client that goes away drops this future, which tears the
/// session down, so the explicit disconnect signal never fires here.
async fn run_poll(
    bridge: &Bridge,
    params: EventParams,
    ctx: &RequestContext,
) -> Result<Option<EventBatch>, RemoteError> {
    let cursor = Cursor::parse(params.ts.as_deref())?;
    let subscriptions = codec::decode_list(params.on.as_deref().unwrap_or_default())?;
    let outcome = bridge
        .poll_events(cursor, subscriptions, ctx, std::future::pending())
        .await?;
    Ok(outcome.into_batch())
}
