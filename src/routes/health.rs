//! Health and version endpoints

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::util::{json_response, BoxBody};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

/// GET /health - liveness probe
pub fn health_check() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            service: "vems",
        },
    )
}

/// GET /version - deployment verification
pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            service: "vems",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
