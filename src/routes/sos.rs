//! HTTP routes for SOS requests
//!
//! - GET    /api/sos_requests[?village_id=]   - scoped listing
//! - POST   /api/sos_requests                 - raise an SOS
//! - PUT    /api/sos_requests/{id}/resolve    - head-only resolution
//! - DELETE /api/sos_requests/cleanup         - head-only removal of
//!   resolved requests in the head's village

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{SosDoc, SosStatus, VillageDoc, SOS_COLLECTION, VILLAGE_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, format_time, json_response, parse_json_body, require_actor,
    village_id_param, visibility_filter, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const SOS_BODY_LIMIT: usize = 10240;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RaiseSosRequest {
    #[serde(default)]
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct SosResponse {
    pub id: String,
    pub owner_id: String,
    pub village_id: i64,
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SosStatus,
    pub created_at: String,
}

impl From<SosDoc> for SosResponse {
    fn from(doc: SosDoc) -> Self {
        SosResponse {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            owner_id: doc.owner_id,
            village_id: doc.village_id,
            message: doc.message,
            latitude: doc.latitude,
            longitude: doc.longitude,
            status: doc.status,
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/sos_requests
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

    let decision = authorize(actor.role(), &actor.scope, EntityKind::Sos, Operation::Read)?;

    let requests: Vec<SosResponse> = match visibility_filter(&decision, actor.real_id(), requested)
    {
        Some(filter) => {
            let collection = state.mongo.collection::<SosDoc>(SOS_COLLECTION).await?;
            collection
                .find_many(filter)
                .await?
                .into_iter()
                .map(SosResponse::from)
                .collect()
        }
        None => Vec::new(),
    };

    Ok(json_response(StatusCode::OK, &requests))
}

/// POST /api/sos_requests
async fn handle_raise(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match raise_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn raise_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Sos,
        Operation::Create,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| VemsError::Authorization("no assigned village to signal for".into()))?;

    let body: RaiseSosRequest = parse_json_body(req, SOS_BODY_LIMIT).await?;

    let villages = state
        .mongo
        .collection::<VillageDoc>(VILLAGE_COLLECTION)
        .await?;
    villages
        .find_one(doc! { "village_id": village_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("village {village_id}")))?;

    let collection = state.mongo.collection::<SosDoc>(SOS_COLLECTION).await?;
    let sos = SosDoc::new(
        actor.real_id().to_string(),
        village_id,
        body.message.trim().to_string(),
        body.latitude,
        body.longitude,
    );
    let id = collection.insert_one(sos).await?;

    info!(
        "SOS {} raised by {} in village {}",
        id.to_hex(),
        actor.real_id(),
        village_id
    );

    let saved = collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| VemsError::Database("inserted SOS not readable".into()))?;

    Ok(json_response(StatusCode::CREATED, &SosResponse::from(saved)))
}

/// PUT /api/sos_requests/{id}/resolve
async fn handle_resolve(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    match resolve_inner(req, state, id).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn resolve_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Sos,
        Operation::Update,
    )?;

    let object_id =
        ObjectId::parse_str(id).map_err(|_| VemsError::Http(format!("invalid SOS id: {id}")))?;

    let collection = state.mongo.collection::<SosDoc>(SOS_COLLECTION).await?;
    let sos = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("SOS request {id}")))?;

    if !decision.villages.permits(sos.village_id) {
        return Err(VemsError::Authorization(
            "SOS request is outside your village".into(),
        ));
    }

    collection
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": {
                "status": "resolved",
                "metadata.updated_at": bson::DateTime::now(),
            }},
        )
        .await?;

    info!("SOS {} resolved by {}", id, actor.real_id());

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "SOS request resolved".into(),
        },
    ))
}

/// DELETE /api/sos_requests/cleanup
async fn handle_cleanup(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match cleanup_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn cleanup_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Sos,
        Operation::Delete,
    )?;

    let villages: Vec<i64> = match &decision.villages {
        crate::policy::VillageFilter::In(set) if !set.is_empty() => {
            set.iter().copied().collect()
        }
        _ => {
            return Ok(json_response(
                StatusCode::OK,
                &CleanupResponse { removed: 0 },
            ))
        }
    };

    let collection = state.mongo.collection::<SosDoc>(SOS_COLLECTION).await?;
    let removed = collection
        .soft_delete(doc! {
            "village_id": { "$in": villages },
            "status": "resolved",
        })
        .await?;

    info!("{} resolved SOS requests cleaned up by {}", removed, actor.real_id());

    Ok(json_response(StatusCode::OK, &CleanupResponse { removed }))
}

// =============================================================================
// Router
// =============================================================================

/// Handle /api/sos_requests* requests. Returns None for unrelated paths.
pub async fn handle_sos_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/sos_requests") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let subpath = path.strip_prefix("/api/sos_requests").unwrap_or("");

    let response = match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,
        (Method::POST, "") | (Method::POST, "/") => handle_raise(req, state).await,
        (Method::DELETE, "/cleanup") => handle_cleanup(req, state).await,
        (Method::PUT, p) if p.ends_with("/resolve") => {
            let id = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/resolve"))
                .unwrap_or("")
                .to_string();
            handle_resolve(req, state, &id).await
        }
        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "not found".into(),
                code: None,
            },
        ),
    };

    Some(response)
}
