//! HTTP routes for announcements
//!
//! - GET    /api/announcements[?village_id=] - scoped listing plus globals
//! - POST   /api/submit_announcement         - head (own village) or super
//!   (a village in scope, or untargeted/global)
//! - DELETE /api/announcements/{id}          - head, own village
//!
//! An announcement without a village is global: visible to every role
//! regardless of scope, so listing unions globals with the caller's
//! villages instead of intersecting.

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{AnnouncementDoc, ANNOUNCEMENT_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation, Role};
use crate::routes::util::{
    cors_preflight, error_response, format_time, json_response, parse_json_body, require_actor,
    village_id_param, visibility_filter, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const ANNOUNCEMENT_BODY_LIMIT: usize = 65536;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitAnnouncementRequest {
    pub title: String,
    pub content: String,
    /// Target village; absent or null means global
    #[serde(default)]
    pub village_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub id: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub village_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl From<AnnouncementDoc> for AnnouncementResponse {
    fn from(doc: AnnouncementDoc) -> Self {
        AnnouncementResponse {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            owner_id: doc.owner_id,
            village_id: doc.village_id,
            title: doc.title,
            content: doc.content,
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/announcements
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match list_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn list_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;
    let requested = village_id_param(req.uri().query())?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Announcement,
        Operation::Read,
    )?;

    // include_global guarantees a filter even for an empty scope
    let announcements: Vec<AnnouncementResponse> =
        match visibility_filter(&decision, actor.real_id(), requested) {
            Some(filter) => {
                let collection = state
                    .mongo
                    .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION)
                    .await?;
                collection
                    .find_many(filter)
                    .await?
                    .into_iter()
                    .map(AnnouncementResponse::from)
                    .collect()
            }
            None => Vec::new(),
        };

    Ok(json_response(StatusCode::OK, &announcements))
}

/// POST /api/submit_announcement
async fn handle_submit(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match submit_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn submit_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Announcement,
        Operation::Create,
    )?;

    let body: SubmitAnnouncementRequest = parse_json_body(req, ANNOUNCEMENT_BODY_LIMIT).await?;

    if body.title.trim().is_empty() || body.content.trim().is_empty() {
        return Err(VemsError::Validation("title and content are required".into()));
    }

    // Heads default to their own village and may not target outside it;
    // supers may target any village in scope or none at all (global).
    let village_id = match (actor.role(), body.village_id) {
        (Role::Head, None) => actor.user.assigned_village,
        (_, target) => target,
    };

    match village_id {
        Some(v) => {
            if !decision.villages.permits(v) {
                return Err(VemsError::Authorization(
                    "village is outside your scope".into(),
                ));
            }
        }
        None => {
            if !decision.include_global {
                return Err(VemsError::Authorization(
                    "only supers may publish global announcements".into(),
                ));
            }
        }
    }

    let collection = state
        .mongo
        .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION)
        .await?;
    let id = collection
        .insert_one(AnnouncementDoc::new(
            actor.real_id().to_string(),
            village_id,
            body.title.trim().to_string(),
            body.content.trim().to_string(),
        ))
        .await?;

    info!(
        "Announcement {} published by {} ({})",
        id.to_hex(),
        actor.real_id(),
        village_id.map_or("global".to_string(), |v| format!("village {v}")),
    );

    let saved = collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| VemsError::Database("inserted announcement not readable".into()))?;

    Ok(json_response(
        StatusCode::CREATED,
        &AnnouncementResponse::from(saved),
    ))
}

/// DELETE /api/announcements/{id}
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    match delete_inner(req, state, id).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn delete_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Announcement,
        Operation::Delete,
    )?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| VemsError::Http(format!("invalid announcement id: {id}")))?;

    let collection = state
        .mongo
        .collection::<AnnouncementDoc>(ANNOUNCEMENT_COLLECTION)
        .await?;
    let announcement = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("announcement {id}")))?;

    // Global announcements belong to no village, so a head may not remove
    // them
    let in_scope = announcement
        .village_id
        .is_some_and(|v| decision.villages.permits(v));
    if !in_scope {
        return Err(VemsError::Authorization(
            "announcement is outside your village".into(),
        ));
    }

    collection.soft_delete(doc! { "_id": object_id }).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "announcement deleted".into(),
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle announcement requests. Returns None for unrelated paths.
pub async fn handle_announcement_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let is_submit = path == "/api/submit_announcement";
    if !path.starts_with("/api/announcements") && !is_submit {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = if is_submit {
        match method {
            Method::POST => handle_submit(req, state).await,
            _ => json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorResponse {
                    error: "method not allowed".into(),
                    code: None,
                },
            ),
        }
    } else {
        let subpath = path.strip_prefix("/api/announcements").unwrap_or("");
        match (method, subpath) {
            (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,
            (Method::DELETE, p) if p.starts_with('/') && !p[1..].is_empty() => {
                let id = p[1..].to_string();
                handle_delete(req, state, &id).await
            }
            _ => json_response(
                StatusCode::NOT_FOUND,
                &ErrorResponse {
                    error: "not found".into(),
                    code: None,
                },
            ),
        }
    };

    Some(response)
}
