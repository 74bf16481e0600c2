//! HTTP routes for villages and village status
//!
//! - GET /api/villages        - directory metadata for authenticated callers
//! - GET /api/village_status  - status card for a village in scope
//! - PUT /api/village_status  - head-only update of own village's status tags
//!
//! The village directory (ids, names) is not scope-filtered; status reads
//! are.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{VillageDoc, VILLAGE_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, json_response, parse_json_body, require_actor,
    village_id_param, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const STATUS_BODY_LIMIT: usize = 10240;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct VillageResponse {
    pub id: i64,
    pub name: String,
    pub population: i64,
}

#[derive(Debug, Serialize)]
pub struct VillageStatusResponse {
    pub village_id: i64,
    pub emergency_status: String,
    pub service_status: String,
    pub todays_reports: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub emergency_status: Option<String>,
    #[serde(default)]
    pub service_status: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/villages
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
    // directory metadata: authentication required, no scope filter
    require_actor(&state, &req).await?;

    let collection = state
        .mongo
        .collection::<VillageDoc>(VILLAGE_COLLECTION)
        .await?;
    let villages: Vec<VillageResponse> = collection
        .find_many_sorted(doc! {}, doc! { "village_id": 1 })
        .await?
        .into_iter()
        .map(|v| VillageResponse {
            id: v.village_id,
            name: v.name,
            population: v.population,
        })
        .collect();

    Ok(json_response(StatusCode::OK, &villages))
}

/// GET /api/village_status?village_id=
async fn handle_get_status(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match get_status_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn get_status_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::VillageStatus,
        Operation::Read,
    )?;

    // villager/head default to their own village when no parameter is given
    let village_id = match village_id_param(req.uri().query())? {
        Some(v) => v,
        None => actor
            .user
            .assigned_village
            .ok_or_else(|| VemsError::Validation("village_id is required".into()))?,
    };

    if !decision.villages.permits(village_id) {
        return Err(VemsError::Authorization("village is outside your scope".into()));
    }

    let collection = state
        .mongo
        .collection::<VillageDoc>(VILLAGE_COLLECTION)
        .await?;
    let village = collection
        .find_one(doc! { "village_id": village_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("village {village_id}")))?;

    Ok(json_response(
        StatusCode::OK,
        &VillageStatusResponse {
            village_id: village.village_id,
            emergency_status: village.emergency_status,
            service_status: village.service_status,
            todays_reports: village.todays_reports,
        },
    ))
}

/// PUT /api/village_status
async fn handle_update_status(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match update_status_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn update_status_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::VillageStatus,
        Operation::Update,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| VemsError::Authorization("no assigned village".into()))?;

    let body: UpdateStatusRequest = parse_json_body(req, STATUS_BODY_LIMIT).await?;

    let mut set = doc! { "metadata.updated_at": bson::DateTime::now() };
    if let Some(emergency) = &body.emergency_status {
        if emergency.trim().is_empty() {
            return Err(VemsError::Validation("emergency_status cannot be empty".into()));
        }
        set.insert("emergency_status", emergency.trim());
    }
    if let Some(service) = &body.service_status {
        if service.trim().is_empty() {
            return Err(VemsError::Validation("service_status cannot be empty".into()));
        }
        set.insert("service_status", service.trim());
    }

    if set.len() == 1 {
        return Err(VemsError::Validation(
            "nothing to update: provide emergency_status or service_status".into(),
        ));
    }

    let collection = state
        .mongo
        .collection::<VillageDoc>(VILLAGE_COLLECTION)
        .await?;
    let result = collection
        .update_one(doc! { "village_id": village_id }, doc! { "$set": set })
        .await?;
    if result.matched_count == 0 {
        return Err(VemsError::NotFound(format!("village {village_id}")));
    }

    info!("Village {} status updated by {}", village_id, actor.real_id());

    let village = collection
        .find_one(doc! { "village_id": village_id })
        .await?
        .ok_or_else(|| VemsError::Database("updated village not readable".into()))?;

    Ok(json_response(
        StatusCode::OK,
        &VillageStatusResponse {
            village_id: village.village_id,
            emergency_status: village.emergency_status,
            service_status: village.service_status,
            todays_reports: village.todays_reports,
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle village requests. Returns None for unrelated paths.
pub async fn handle_village_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/villages") && !path.starts_with("/api/village_status") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/api/villages") => handle_list(req, state).await,
        (Method::GET, "/api/village_status") => handle_get_status(req, state).await,
        (Method::PUT, "/api/village_status") => handle_update_status(req, state).await,
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
