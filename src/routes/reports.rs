//! HTTP routes for incident reports
//!
//! - GET    /api/reports[?village_id=] - scoped listing, newest first
//! - POST   /api/reports               - submit a report with attachments
//! - DELETE /api/reports/{id}          - head-only resolution
//!
//! Submission is all-or-nothing: attachments are validated and decoded
//! before anything is written, and a failed counter update rolls the report
//! back. Deletion requires the head role and is bounded to the head's own
//! village - the resolution endpoint deliberately does not accept
//! unauthenticated calls.

use base64::Engine;
use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::schemas::{
    ReportDoc, VillageDoc, REPORT_COLLECTION, VILLAGE_COLLECTION,
};
use crate::files::{extension_allowed, ALLOWED_EXTENSIONS};
use crate::policy::{authorize, EntityKind, Operation};
use crate::routes::util::{
    cors_preflight, error_response, format_time, json_response, parse_json_body, require_actor,
    village_id_param, visibility_filter, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

/// Attachments per submission
pub const MAX_ATTACHMENTS: usize = 3;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AttachmentUpload {
    pub name: String,
    /// Base64-encoded file content
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReportRequest {
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub files: Vec<AttachmentUpload>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub owner_id: String,
    pub village_id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub attachments: Vec<String>,
    pub submitted_at: String,
}

impl From<ReportDoc> for ReportResponse {
    fn from(doc: ReportDoc) -> Self {
        ReportResponse {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            owner_id: doc.owner_id,
            village_id: doc.village_id,
            title: doc.title,
            category: doc.category,
            description: doc.description,
            latitude: doc.latitude,
            longitude: doc.longitude,
            attachments: doc.attachments,
            submitted_at: format_time(doc.metadata.created_at),
        }
    }
}

/// Validate and decode every attachment before anything is written - a
/// single bad file rejects the whole submission, so a failed upload leaves
/// zero report records and zero blob-store writes.
fn decode_attachments(
    files: &[AttachmentUpload],
) -> Result<Vec<(&str, Vec<u8>)>, VemsError> {
    if files.len() > MAX_ATTACHMENTS {
        return Err(VemsError::Validation(format!(
            "at most {MAX_ATTACHMENTS} attachments per report"
        )));
    }

    let mut decoded = Vec::with_capacity(files.len());
    for file in files {
        if !extension_allowed(&file.name) {
            return Err(VemsError::Validation(format!(
                "file type not allowed: {} (allowed: {})",
                file.name,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&file.data)
            .map_err(|_| {
                VemsError::Validation(format!("attachment {} is not valid base64", file.name))
            })?;
        decoded.push((file.name.as_str(), bytes));
    }
    Ok(decoded)
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/reports
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
        EntityKind::Report,
        Operation::Read,
    )?;

    let reports: Vec<ReportResponse> =
        match visibility_filter(&decision, actor.real_id(), requested) {
            Some(filter) => {
                let collection = state
                    .mongo
                    .collection::<ReportDoc>(REPORT_COLLECTION)
                    .await?;
                collection
                    .find_many(filter)
                    .await?
                    .into_iter()
                    .map(ReportResponse::from)
                    .collect()
            }
            // empty scope: nothing visible, not an error
            None => Vec::new(),
        };

    Ok(json_response(StatusCode::OK, &reports))
}

/// POST /api/reports
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
        EntityKind::Report,
        Operation::Create,
    )?;

    let village_id = actor
        .user
        .assigned_village
        .filter(|v| decision.villages.permits(*v))
        .ok_or_else(|| {
            VemsError::Authorization("no assigned village to report for".into())
        })?;

    let body: SubmitReportRequest = parse_json_body(req, state.args.max_body_bytes).await?;

    if body.title.trim().is_empty() || body.description.trim().is_empty() {
        return Err(VemsError::Validation(
            "title and description are required".into(),
        ));
    }

    let decoded = decode_attachments(&body.files)?;

    // The village must exist before we touch its counter
    let villages = state
        .mongo
        .collection::<VillageDoc>(VILLAGE_COLLECTION)
        .await?;
    villages
        .find_one(doc! { "village_id": village_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("village {village_id}")))?;

    // Store blobs under unique generated names; undo on any failure
    let mut stored_names: Vec<String> = Vec::with_capacity(decoded.len());
    for (name, bytes) in &decoded {
        match state.files.save(bytes, name).await {
            Ok(stored) => stored_names.push(stored),
            Err(e) => {
                for stored in &stored_names {
                    state.files.remove(stored).await;
                }
                return Err(e);
            }
        }
    }

    let reports = state
        .mongo
        .collection::<ReportDoc>(REPORT_COLLECTION)
        .await?;
    let report = ReportDoc::new(
        actor.real_id().to_string(),
        village_id,
        body.title.trim().to_string(),
        body.category.trim().to_string(),
        body.description.trim().to_string(),
        body.latitude,
        body.longitude,
        stored_names.clone(),
    );

    let report_id = match reports.insert_one(report).await {
        Ok(id) => id,
        Err(e) => {
            for stored in &stored_names {
                state.files.remove(stored).await;
            }
            return Err(e);
        }
    };

    // $inc is atomic, so concurrent submissions are all reflected; a
    // missing counter field starts from zero. If the village vanished in
    // the meantime, roll the report back so nothing partial persists.
    let counter_update = villages
        .update_one(
            doc! { "village_id": village_id },
            doc! { "$inc": { "todays_reports": 1_i64 } },
        )
        .await;

    let rollback = match counter_update {
        Ok(result) if result.matched_count == 0 => true,
        Ok(_) => false,
        Err(e) => {
            error!("Counter update failed for village {}: {}", village_id, e);
            true
        }
    };

    if rollback {
        let _ = reports.delete_one(doc! { "_id": report_id }).await;
        for stored in &stored_names {
            state.files.remove(stored).await;
        }
        return Err(VemsError::Database(
            "report submission could not be completed".into(),
        ));
    }

    info!(
        "Report {} submitted by {} for village {} ({} attachments)",
        report_id.to_hex(),
        actor.real_id(),
        village_id,
        stored_names.len()
    );

    let saved = reports
        .find_one(doc! { "_id": report_id })
        .await?
        .ok_or_else(|| VemsError::Database("inserted report not readable".into()))?;

    Ok(json_response(
        StatusCode::CREATED,
        &ReportResponse::from(saved),
    ))
}

/// DELETE /api/reports/{id}
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
        EntityKind::Report,
        Operation::Delete,
    )?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| VemsError::Http(format!("invalid report id: {id}")))?;

    let reports = state
        .mongo
        .collection::<ReportDoc>(REPORT_COLLECTION)
        .await?;
    let report = reports
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| VemsError::NotFound(format!("report {id}")))?;

    if !decision.villages.permits(report.village_id) {
        return Err(VemsError::Authorization(
            "report is outside your village".into(),
        ));
    }

    reports.soft_delete(doc! { "_id": object_id }).await?;

    info!(
        "Report {} resolved by {} (village {})",
        id,
        actor.real_id(),
        report.village_id
    );

    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "report resolved".into(),
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle /api/reports* requests. Returns None for unrelated paths.
pub async fn handle_report_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/api/reports") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let subpath = path.strip_prefix("/api/reports").unwrap_or("");

    let response = match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,
        (Method::POST, "") | (Method::POST, "/") => handle_submit(req, state).await,
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

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn upload(name: &str, bytes: &[u8]) -> AttachmentUpload {
        AttachmentUpload {
            name: name.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    #[test]
    fn test_attachments_within_cap_decode() {
        let files = vec![
            upload("a.jpg", b"one"),
            upload("b.png", b"two"),
            upload("c.pdf", b"three"),
        ];
        let decoded = decode_attachments(&files).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].0, "a.jpg");
        assert_eq!(decoded[2].1, b"three");
    }

    #[test]
    fn test_four_attachments_rejected() {
        let files = vec![
            upload("a.jpg", b"1"),
            upload("b.jpg", b"2"),
            upload("c.jpg", b"3"),
            upload("d.jpg", b"4"),
        ];
        let err = decode_attachments(&files).unwrap_err();
        assert!(matches!(err, VemsError::Validation(_)));
    }

    #[test]
    fn test_one_bad_extension_rejects_whole_submission() {
        let files = vec![upload("a.jpg", b"ok"), upload("evil.exe", b"nope")];
        let err = decode_attachments(&files).unwrap_err();
        assert!(matches!(err, VemsError::Validation(_)));
        assert!(err.to_string().contains("evil.exe"));
    }

    #[test]
    fn test_bad_base64_rejects_whole_submission() {
        let files = vec![
            upload("a.jpg", b"ok"),
            AttachmentUpload {
                name: "b.jpg".to_string(),
                data: "not//valid@@base64!!".to_string(),
            },
        ];
        assert!(decode_attachments(&files).is_err());
    }

    #[test]
    fn test_no_attachments_is_fine() {
        assert!(decode_attachments(&[]).unwrap().is_empty());
    }
}
