//! Shared route plumbing
//!
//! Response builders, body parsing, bearer-token authentication, and the
//! translation from a policy [`Decision`] into a MongoDB filter. Every
//! protected handler funnels through [`authenticate`] and
//! [`visibility_filter`] so the checks cannot drift between routes.

use bson::{doc, Document};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::auth::{extract_token_from_header, Claims};
use crate::db::schemas::{SupAccessDoc, UserDoc, SUP_ACCESS_COLLECTION, USER_COLLECTION};
use crate::policy::{resolve_scope, Decision, ResolvedScope, Role, VillageFilter};
use crate::server::AppState;
use crate::types::VemsError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Response helpers
// =============================================================================

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// Map a service error to its HTTP response without leaking internals
pub fn error_response(err: &VemsError) -> Response<BoxBody> {
    json_response(
        err.status(),
        &ErrorResponse {
            error: err.public_message(),
            code: Some(err.code().to_string()),
        },
    )
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

// =============================================================================
// Request helpers
// =============================================================================

pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
    max_bytes: usize,
) -> Result<T, VemsError> {
    let body = req
        .collect()
        .await
        .map_err(|e| VemsError::Http(format!("failed to read body: {e}")))?;

    let bytes = body.to_bytes();
    if bytes.len() > max_bytes {
        return Err(VemsError::Http("request body too large".into()));
    }

    serde_json::from_slice(&bytes).map_err(|e| VemsError::Http(format!("invalid JSON: {e}")))
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// RFC 3339 rendering of a document timestamp for responses
pub fn format_time(time: Option<bson::DateTime>) -> String {
    time.map(|t| t.to_chrono().to_rfc3339()).unwrap_or_default()
}

/// Parse an optional `village_id` query parameter
pub fn village_id_param(query: Option<&str>) -> Result<Option<i64>, VemsError> {
    let Some(query) = query else {
        return Ok(None);
    };

    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("village_id=") {
            if value.is_empty() {
                return Ok(None);
            }
            return value
                .parse::<i64>()
                .map(Some)
                .map_err(|_| VemsError::Http(format!("invalid village_id: {value}")));
        }
    }

    Ok(None)
}

// =============================================================================
// Authentication and scope loading
// =============================================================================

/// Validate the bearer token on a protected request.
///
/// Missing, malformed, expired, and revoked tokens all surface as
/// authentication failures (401), distinct from authorization denials (403).
pub fn authenticate(state: &AppState, req: &Request<Incoming>) -> Result<Claims, VemsError> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| VemsError::Authentication("no token provided".into()))?;

    let result = state.tokens.validate(token);
    if !result.valid {
        return Err(VemsError::Authentication(
            result.error.unwrap_or_else(|| "invalid token".into()),
        ));
    }

    result
        .claims
        .ok_or_else(|| VemsError::Authentication("invalid token".into()))
}

/// An authenticated caller with their resolved village scope
#[derive(Debug)]
pub struct Actor {
    pub user: UserDoc,
    pub scope: ResolvedScope,
}

impl Actor {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn real_id(&self) -> &str {
        &self.user.real_id
    }
}

/// Load the caller's identity record and resolve their scope.
///
/// The role is re-read from storage on every call rather than trusted from
/// the token, so a role change takes effect immediately.
pub async fn load_actor(state: &AppState, claims: &Claims) -> Result<Actor, VemsError> {
    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let user = users
        .find_one(doc! { "real_id": &claims.sub })
        .await?
        .ok_or_else(|| VemsError::Authentication("unknown identity".into()))?;

    let scope = match user.role {
        Role::Super => {
            let assignments = state
                .mongo
                .collection::<SupAccessDoc>(SUP_ACCESS_COLLECTION)
                .await?;
            let assignment = assignments
                .find_one(doc! { "user_id": &user.real_id })
                .await?;
            resolve_scope(
                user.role,
                user.assigned_village,
                assignment.as_ref().map(|a| a.village_ids.as_slice()),
            )
        }
        _ => resolve_scope(user.role, user.assigned_village, None),
    };

    Ok(Actor { user, scope })
}

/// Authenticate and load in one step; the common prologue of every
/// protected handler.
pub async fn require_actor(
    state: &AppState,
    req: &Request<Incoming>,
) -> Result<Actor, VemsError> {
    let claims = authenticate(state, req)?;
    load_actor(state, &claims).await
}

// =============================================================================
// Decision -> query translation
// =============================================================================

/// Turn a policy decision into a MongoDB filter.
///
/// Returns `None` when the decision can never match a record (empty scope),
/// so the handler can answer with an empty list without touching storage.
/// The optional `requested` village narrows the filter by intersection.
pub fn visibility_filter(
    decision: &Decision,
    caller_id: &str,
    requested: Option<i64>,
) -> Option<Document> {
    let villages = decision.villages.clone().narrow(requested);

    let village_term = match (&villages, decision.include_global) {
        (VillageFilter::Any, _) => None,
        (VillageFilter::In(set), false) => {
            if set.is_empty() {
                return None;
            }
            let ids: Vec<i64> = set.iter().copied().collect();
            Some(doc! { "village_id": { "$in": ids } })
        }
        (VillageFilter::In(set), true) => {
            // announcements: union the scope with global (village-less)
            // records instead of intersecting
            let ids: Vec<i64> = set.iter().copied().collect();
            Some(doc! {
                "$or": [
                    { "village_id": { "$in": ids } },
                    { "village_id": null },
                ]
            })
        }
    };

    let mut filter = Document::new();
    if decision.owner_only {
        filter.insert("owner_id", caller_id);
    }
    if let Some(term) = village_term {
        filter.extend(term);
    }

    Some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn decision(owner_only: bool, villages: VillageFilter, include_global: bool) -> Decision {
        Decision {
            owner_only,
            villages,
            include_global,
        }
    }

    #[test]
    fn test_owner_only_filter() {
        let d = decision(true, VillageFilter::Any, false);
        let filter = visibility_filter(&d, "VLG0001", None).unwrap();
        assert_eq!(filter, doc! { "owner_id": "VLG0001" });
    }

    #[test]
    fn test_owner_only_narrowed_by_village_param() {
        let d = decision(true, VillageFilter::Any, false);
        let filter = visibility_filter(&d, "VLG0001", Some(7)).unwrap();
        assert_eq!(
            filter,
            doc! { "owner_id": "VLG0001", "village_id": { "$in": [7_i64] } }
        );
    }

    #[test]
    fn test_village_set_filter() {
        let d = decision(
            false,
            VillageFilter::In(BTreeSet::from([7, 9])),
            false,
        );
        let filter = visibility_filter(&d, "S1", None).unwrap();
        assert_eq!(filter, doc! { "village_id": { "$in": [7_i64, 9_i64] } });
    }

    #[test]
    fn test_empty_scope_short_circuits() {
        let d = decision(false, VillageFilter::In(BTreeSet::new()), false);
        assert!(visibility_filter(&d, "S1", None).is_none());
    }

    #[test]
    fn test_out_of_scope_narrowing_short_circuits() {
        let d = decision(false, VillageFilter::In(BTreeSet::from([7, 9])), false);
        assert!(visibility_filter(&d, "S1", Some(12)).is_none());
    }

    #[test]
    fn test_global_union_survives_empty_scope() {
        // super with no assignment still sees global announcements
        let d = decision(false, VillageFilter::In(BTreeSet::new()), true);
        let filter = visibility_filter(&d, "S1", None).unwrap();
        let ids: Vec<i64> = vec![];
        assert_eq!(
            filter,
            doc! { "$or": [
                { "village_id": { "$in": ids } },
                { "village_id": null },
            ]}
        );
    }

    #[test]
    fn test_global_union_with_narrowing() {
        let d = decision(false, VillageFilter::In(BTreeSet::from([7, 9])), true);
        let filter = visibility_filter(&d, "S1", Some(7)).unwrap();
        assert_eq!(
            filter,
            doc! { "$or": [
                { "village_id": { "$in": [7_i64] } },
                { "village_id": null },
            ]}
        );
    }

    #[test]
    fn test_village_id_param_parsing() {
        assert_eq!(village_id_param(None).unwrap(), None);
        assert_eq!(village_id_param(Some("village_id=7")).unwrap(), Some(7));
        assert_eq!(
            village_id_param(Some("foo=bar&village_id=42")).unwrap(),
            Some(42)
        );
        assert_eq!(village_id_param(Some("village_id=")).unwrap(), None);
        assert_eq!(village_id_param(Some("foo=bar")).unwrap(), None);
        assert!(village_id_param(Some("village_id=abc")).is_err());
    }
}
