//! HTTP route for serving stored attachments
//!
//! GET /api/uploads/{stored_name} - returns the blob for any authenticated
//! caller. Stored names are server-generated and unguessable (uuid prefix),
//! and the file store refuses anything that is not a bare name.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::files::content_type_for;
use crate::routes::util::{
    cors_preflight, error_response, full_body, json_response, require_actor, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;
use crate::types::VemsError;

async fn handle_serve(
    req: Request<Incoming>,
    state: Arc<AppState>,
    name: &str,
) -> Response<BoxBody> {
    match serve_inner(req, state, name).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn serve_inner(
    req: Request<Incoming>,
    state: Arc<AppState>,
    name: &str,
) -> Result<Response<BoxBody>, VemsError> {
    require_actor(&state, &req).await?;

    let bytes = state.files.read(name).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type_for(name))
        .header("Content-Length", bytes.len())
        .header("Access-Control-Allow-Origin", "*")
        .body(full_body(bytes))
        .unwrap())
}

/// Handle /api/uploads/* requests. Returns None for unrelated paths.
pub async fn handle_upload_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let Some(name) = path.strip_prefix("/api/uploads/") else {
        return None;
    };
    let name = name.to_string();

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match method {
        Method::GET => handle_serve(req, state, &name).await,
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
