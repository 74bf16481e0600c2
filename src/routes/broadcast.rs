//! HTTP route for broadcast notifications
//!
//! POST /api/broadcast - head-only fan-out of a text message to every user
//! with a phone number in the head's village. Delivery is best-effort with
//! per-recipient isolation; the response carries final counts and a failed
//! send never affects stored data.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, json_response, parse_json_body, require_actor, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const BROADCAST_BODY_LIMIT: usize = 10240;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub message: String,
}

async fn handle_broadcast(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match broadcast_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn broadcast_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    // broadcasting rides on the head's announcement authority
    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Announcement,
        Operation::Create,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| VemsError::Authorization("no assigned village".into()))?;

    let body: BroadcastRequest = parse_json_body(req, BROADCAST_BODY_LIMIT).await?;
    if body.message.trim().is_empty() {
        return Err(VemsError::Validation("message is required".into()));
    }

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let recipients: Vec<String> = users
        .find_many(doc! { "assigned_village": village_id })
        .await?
        .into_iter()
        .map(|u| u.phone)
        .filter(|phone| !phone.is_empty())
        .collect();

    info!(
        "Broadcast by {} to village {} ({} recipients)",
        actor.real_id(),
        village_id,
        recipients.len()
    );

    let outcome = state
        .gateway
        .broadcast(&recipients, body.message.trim())
        .await;

    Ok(json_response(StatusCode::OK, &outcome))
}

/// Handle /api/broadcast requests. Returns None for unrelated paths.
pub async fn handle_broadcast_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method().clone();

    if path != "/api/broadcast" {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match method {
        Method::POST => handle_broadcast(req, state).await,
        _ => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "method not allowed".into(),
                code: None,
            },
        ),
    };

    Some(response)
}
