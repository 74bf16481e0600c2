//! HTTP routes for administrative notes
//!
//! Head-only CRUD, scoped to the head's own village:
//! - GET    /api/notes
//! - POST   /api/notes
//! - PUT    /api/notes/{id}
//! - DELETE /api/notes/{id}

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{NoteDoc, NOTE_COLLECTION};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, format_time, json_response, parse_json_body, require_actor,
    visibility_filter, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

const NOTE_BODY_LIMIT: usize = 65536;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: String,
    pub owner_id: String,
    pub village_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl From<NoteDoc> for NoteResponse {
    fn from(doc: NoteDoc) -> Self {
        NoteResponse {
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

    let decision = authorize(actor.role(), &actor.scope, EntityKind::Note, Operation::Read)?;

    let notes: Vec<NoteResponse> = match visibility_filter(&decision, actor.real_id(), None) {
        Some(filter) => {
            let collection = state.mongo.collection::<NoteDoc>(NOTE_COLLECTION).await?;
            collection
                .find_many(filter)
                .await?
                .into_iter()
                .map(NoteResponse::from)
                .collect()
        }
        None => Vec::new(),
    };

    Ok(json_response(StatusCode::OK, &notes))
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
        EntityKind::Note,
        Operation::Create,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| VemsError::Authorization("no assigned village".into()))?;

    let body: NotePayload = parse_json_body(req, NOTE_BODY_LIMIT).await?;
    if body.title.trim().is_empty() {
        return Err(VemsError::Validation("title is required".into()));
    }

    let collection = state.mongo.collection::<NoteDoc>(NOTE_COLLECTION).await?;
    let id = collection
        .insert_one(NoteDoc::new(
            actor.real_id().to_string(),
            village_id,
            body.title.trim().to_string(),
            body.content,
        ))
        .await?;

    info!("Note {} created by {} in village {}", id.to_hex(), actor.real_id(), village_id);

    let saved = collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| VemsError::Database("inserted note not readable".into()))?;

    Ok(json_response(StatusCode::CREATED, &NoteResponse::from(saved)))
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
        EntityKind::Note,
        Operation::Update,
    )?;

    let object_id =
        ObjectId::parse_str(id).map_err(|_| VemsError::Http(format!("invalid note id: {id}")))?;

    let collection = state.mongo.collection::<NoteDoc>(NOTE_COLLECTION).await?;
    let note = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("note {id}")))?;

    if !decision.villages.permits(note.village_id) {
        return Err(VemsError::Authorization("note is outside your village".into()));
    }

    let body: NotePayload = parse_json_body(req, NOTE_BODY_LIMIT).await?;
    if body.title.trim().is_empty() {
        return Err(VemsError::Validation("title is required".into()));
    }

    collection
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": {
                "title": body.title.trim(),
                "content": &body.content,
                "metadata.updated_at": bson::DateTime::now(),
            }},
        )
        .await?;

    let saved = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::Database("updated note not readable".into()))?;

    Ok(json_response(StatusCode::OK, &NoteResponse::from(saved)))
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
        EntityKind::Note,
        Operation::Delete,
    )?;

    let object_id =
        ObjectId::parse_str(id).map_err(|_| VemsError::Http(format!("invalid note id: {id}")))?;

    let collection = state.mongo.collection::<NoteDoc>(NOTE_COLLECTION).await?;
    let note = collection
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("note {id}")))?;

    if !decision.villages.permits(note.village_id) {
        return Err(VemsError::Authorization("note is outside your village".into()));
    }

    collection.soft_delete(doc! { "_id": object_id }).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "note deleted".into(),
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle /api/notes* requests. Returns None for unrelated paths.
pub async fn handle_note_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/notes") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let subpath = path.strip_prefix("/api/notes").unwrap_or("");

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
