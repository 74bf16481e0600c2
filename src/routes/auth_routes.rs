//! HTTP routes for authentication
//!
//! - POST   /api/register - Create a villager account
//! - POST   /api/login    - Authenticate and get a session token
//! - DELETE /api/logout   - Revoke the presented token
//! - GET    /api/me       - Current identity from token
//!
//! Head and super identities are never created here; the trusted operator
//! seed tool (`vems-seed`) is the only path that assigns elevated roles.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    extract_token_from_header, hash_password, validate_registration, verify_password,
    validation::RegistrationInput,
};
use crate::db::schemas::{
    SupAccessDoc, UserDoc, VillageDoc, SUP_ACCESS_COLLECTION, USER_COLLECTION, VILLAGE_COLLECTION,
};
use crate::policy::Role;
use crate::routes::util::{
    cors_preflight, error_response, get_auth_header, json_response, parse_json_body,
    require_actor, BoxBody, ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

// Registration and login bodies are small; attachments go elsewhere
const AUTH_BODY_LIMIT: usize = 10240;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// External user identifier (alphanumeric)
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    /// Home village; optional at registration time
    #[serde(default)]
    pub village_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_village: Option<i64>,
    /// Super-role scope; empty for other roles
    pub village_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: u64,
    pub user: UserResponse,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/register
///
/// Public self-registration. Validation order is fixed (first failure
/// wins): name, email, phone, identifier, password - then uniqueness of
/// email and identifier. Role is always villager on this path.
async fn handle_register(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match register_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn register_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let body: RegisterRequest = parse_json_body(req, AUTH_BODY_LIMIT).await?;

    validate_registration(&RegistrationInput {
        real_id: &body.id,
        name: &body.name,
        email: &body.email,
        phone: &body.phone,
        password: &body.password,
    })?;

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    // Uniqueness: email OR identifier already taken is a conflict. The
    // unique indexes catch the insert race below.
    let existing = users
        .find_one(doc! { "$or": [ { "email": &body.email }, { "real_id": &body.id } ] })
        .await?;
    if existing.is_some() {
        return Err(VemsError::Conflict(
            "an account with this email or id already exists".into(),
        ));
    }

    // A supplied home village must exist
    if let Some(village_id) = body.village_id {
        let villages = state
            .mongo
            .collection::<VillageDoc>(VILLAGE_COLLECTION)
            .await?;
        villages
            .find_one(doc! { "village_id": village_id })
            .await?
            .ok_or_else(|| VemsError::NotFound(format!("village {village_id}")))?;
    }

    let password_hash = hash_password(&body.password)?;

    let user = UserDoc::new(
        body.id.clone(),
        body.name.trim().to_string(),
        body.email.clone(),
        password_hash,
        body.phone.clone(),
        Role::Villager,
        body.village_id,
    );

    if let Err(e) = users.insert_one(user).await {
        let detail = e.to_string();
        if detail.contains("duplicate key") || detail.contains("E11000") {
            return Err(VemsError::Conflict(
                "an account with this email or id already exists".into(),
            ));
        }
        return Err(e);
    }

    info!("Registered villager {} ({})", body.id, body.email);

    Ok(json_response(
        StatusCode::CREATED,
        &SuccessResponse {
            success: true,
            message: "registration successful".into(),
        },
    ))
}

/// POST /api/login
///
/// Lookup is by email only; the password is compared against the stored
/// hash. Unknown email and wrong password produce the identical response so
/// accounts cannot be enumerated.
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match login_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn login_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let body: LoginRequest = parse_json_body(req, AUTH_BODY_LIMIT).await?;

    if body.email.is_empty() || body.password.is_empty() {
        return Err(VemsError::Validation(
            "missing required fields: email, password".into(),
        ));
    }

    let invalid = || VemsError::Authentication("invalid credentials".into());

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let user = match users.find_one(doc! { "email": &body.email }).await? {
        Some(u) => u,
        None => {
            warn!("Login failed for {}", body.email);
            return Err(invalid());
        }
    };

    let password_valid = verify_password(&body.password, &user.password_hash)?;
    if !password_valid {
        warn!("Login failed for {}", body.email);
        return Err(invalid());
    }

    let (token, claims) = state.tokens.issue(&user.real_id, user.role)?;

    // Supers carry their scope in the login payload so the client can
    // populate its village picker
    let village_ids = if user.role == Role::Super {
        let assignments = state
            .mongo
            .collection::<SupAccessDoc>(SUP_ACCESS_COLLECTION)
            .await?;
        assignments
            .find_one(doc! { "user_id": &user.real_id })
            .await?
            .map(|a| a.village_ids)
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    info!("Login successful: {} ({})", user.real_id, user.role);

    Ok(json_response(
        StatusCode::OK,
        &AuthResponse {
            token,
            expires_at: claims.exp,
            user: UserResponse {
                id: user.real_id,
                name: user.name,
                email: user.email,
                role: user.role,
                assigned_village: user.assigned_village,
                village_ids,
            },
        },
    ))
}

/// DELETE /api/logout
///
/// Adds the token's id to the revocation set. Idempotent: logging out an
/// already-revoked token succeeds again.
async fn handle_logout(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let token = match extract_token_from_header(get_auth_header(&req)) {
        Some(t) => t,
        None => {
            return error_response(&VemsError::Authentication("no token provided".into()));
        }
    };

    // Signature and expiry only - a revoked token may be logged out again
    let claims = match state.tokens.decode(token) {
        Ok(c) => c,
        Err(e) => return error_response(&VemsError::Authentication(e)),
    };

    state.tokens.revoke(&claims.jti);
    info!("Logged out {}", claims.sub);

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "logged out".into(),
        },
    )
}

/// GET /api/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match me_inner(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn me_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, VemsError> {
    let actor = require_actor(&state, &req).await?;

    let village_ids = if actor.user.role == Role::Super {
        actor.scope.villages().into_iter().collect()
    } else {
        Vec::new()
    };
    Ok(json_response(
        StatusCode::OK,
        &UserResponse {
            id: actor.user.real_id,
            name: actor.user.name,
            email: actor.user.email,
            role: actor.user.role,
            assigned_village: actor.user.assigned_village,
            village_ids,
        },
    ))
}

// =============================================================================
// Router
// =============================================================================

/// Handle auth-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None if it is not an
/// auth route.
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path) {
        (&Method::POST, "/api/register") => handle_register(req, state).await,
        (&Method::POST, "/api/login") => handle_login(req, state).await,
        (&Method::DELETE, "/api/logout") => handle_logout(req, state).await,
        (&Method::GET, "/api/me") => handle_me(req, state).await,

        (_, "/api/register") | (_, "/api/login") | (_, "/api/logout") | (_, "/api/me") => {
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorResponse {
                    error: "method not allowed".into(),
                    code: None,
                },
            )
        }

        _ => return None,
    };

    Some(response)
}
