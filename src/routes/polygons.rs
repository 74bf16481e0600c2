//! HTTP routes for hazard polygons
//!
//! Head-only CRUD, scoped to the head's own village:
//! - GET    /api/polygons
//! - POST   /api/polygons
//! - PUT    /api/polygons/{id}
//! - DELETE /api/polygons/{id}
//!
//! Polygon coordinates are stored as submitted; no geometry validation or
//! computation happens server-side.

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{GeoPoint, PolygonDoc, POLYGON_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, format_time, json_response, parse_json_body, require_actor,
    visibility_filter, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const POLYGON_BODY_LIMIT: usize = 262144;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PolygonPayload {
    pub name: String,
    #[serde(default)]
    pub hazard_kind: String,
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Serialize)]
pub struct PolygonResponse {
    pub id: String,
    pub owner_id: String,
    pub village_id: i64,
    pub name: String,
    pub hazard_kind: String,
    pub points: Vec<GeoPoint>,
    pub created_at: String,
}

impl From<PolygonDoc> for PolygonResponse {
    fn from(doc: PolygonDoc) -> Self {
        PolygonResponse {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            owner_id: doc.owner_id,
            village_id: doc.village_id,
            name: doc.name,
            hazard_kind: doc.hazard_kind,
            points: doc.points,
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

fn validate_payload(body: &PolygonPayload) -> Result<(), VemsError> {
    if body.name.trim().is_empty() {
        return Err(VemsError::Validation("polygon name is required".into()));
    }
    if body.points.len() < 3 {
        return Err(VemsError::Validation(
            "a polygon needs at least 3 points".into(),
        ));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

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

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Polygon,
        Operation::Read,
    )?;

    let polygons: Vec<PolygonResponse> = match visibility_filter(&decision, actor.real_id(), None)
    {
        Some(filter) => {
            let collection = state
                .mongo
                .collection::<PolygonDoc>(POLYGON_COLLECTION)
                .await?;
            collection
                .find_many(filter)
                .await?
                .into_iter()
                .map(PolygonResponse::from)
                .collect()
        }
        None => Vec::new(),
    };

    Ok(json_response(StatusCode::OK, &polygons))
}

async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match create_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn create_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Polygon,
        Operation::Create,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| VemsError::Authorization("no assigned village".into()))?;

    let body: PolygonPayload = parse_json_body(req, POLYGON_BODY_LIMIT).await?;
    validate_payload(&body)?;

    let collection = state
        .mongo
        .collection::<PolygonDoc>(POLYGON_COLLECTION)
        .await?;
    let id = collection
        .insert_one(PolygonDoc::new(
            actor.real_id().to_string(),
            village_id,
            body.name.trim().to_string(),
            body.hazard_kind.trim().to_string(),
            body.points,
        ))
        .await?;

    info!(
        "Polygon {} created by {} in village {}",
        id.to_hex(),
        actor.real_id(),
        village_id
    );

    let saved = collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| VemsError::Database("inserted polygon not readable".into()))?;

    Ok(json_response(
        StatusCode::CREATED,
        &PolygonResponse::from(saved),
    ))
}

async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    match update_inner(req, state, id).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn update_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let decision = authorize(
        actor.role(),
        &actor.scope,
        EntityKind::Polygon,
        Operation::Update,
    )?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| VemsError::Http(format!("invalid polygon id: {id}")))?;

    let collection = state
        .mongo
        .collection::<PolygonDoc>(POLYGON_COLLECTION)
        .await?;
    let polygon = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("polygon {id}")))?;

    if !decision.villages.permits(polygon.village_id) {
        return Err(VemsError::Authorization(
            "polygon is outside your village".into(),
        ));
    }

    let body: PolygonPayload = parse_json_body(req, POLYGON_BODY_LIMIT).await?;
    validate_payload(&body)?;

    let points = bson::to_bson(&body.points)
        .map_err(|e| VemsError::Database(format!("failed to encode points: {e}")))?;

    collection
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": {
                "name": body.name.trim(),
                "hazard_kind": body.hazard_kind.trim(),
                "points": points,
                "metadata.updated_at": bson::DateTime::now(),
            }},
        )
        .await?;

    let saved = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::Database("updated polygon not readable".into()))?;

    Ok(json_response(StatusCode::OK, &PolygonResponse::from(saved)))
}

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
        EntityKind::Polygon,
        Operation::Delete,
    )?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| VemsError::Http(format!("invalid polygon id: {id}")))?;

    let collection = state
        .mongo
        .collection::<PolygonDoc>(POLYGON_COLLECTION)
        .await?;
    let polygon = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("polygon {id}")))?;

    if !decision.villages.permits(polygon.village_id) {
        return Err(VemsError::Authorization(
            "polygon is outside your village".into(),
        ));
    }

    collection.soft_delete(doc! { "_id": object_id }).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "polygon deleted".into(),
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle /api/polygons* requests. Returns None for unrelated paths.
pub async fn handle_polygon_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/polygons") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let subpath = path.strip_prefix("/api/polygons").unwrap_or("");

    let response = match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,
        (Method::POST, "") | (Method::POST, "/") => handle_create(req, state).await,
        (Method::PUT, p) if p.starts_with('/') && !p[1..].is_empty() => {
            let id = p[1..].to_string();
            handle_update(req, state, &id).await
        }
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
    };

    Some(response)
}
