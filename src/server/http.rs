//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection. Requests are
//! dispatched to per-area prefix routers; each router validates the bearer
//! token and consults the policy engine before touching storage.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{RevocationSet, TokenService};
use crate::config::Args;
use crate::db::MongoClient;
use crate::files::FileStore;
use crate::notify::MessageGateway;
use crate::routes;
use crate::routes::util::{cors_preflight, json_response, BoxBody, ErrorResponse};
use crate::types::VemsError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    /// Session token issue/validate/revoke; owns the revocation set
    pub tokens: TokenService,
    /// Disk-backed attachment store
    pub files: FileStore,
    /// Outbound messaging gateway for broadcasts
    pub gateway: MessageGateway,
}

impl AppState {
    pub fn new(args: Args, mongo: MongoClient) -> Self {
        let tokens = TokenService::new(
            &args.jwt_secret(),
            args.jwt_expiry_seconds,
            Arc::new(RevocationSet::new()),
        );
        let files = FileStore::new(args.upload_dir.clone());
        let gateway = MessageGateway::new(args.gateway_url.clone());

        Self {
            args,
            mongo,
            tokens,
            files,
            gateway,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), VemsError> {
    state.files.ensure_root().await?;

    let listener = TcpListener::bind(state.args.listen).await?;

    info!("VEMS backend listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - insecure default JWT secret in use");
    }
    if !state.gateway.is_configured() {
        warn!("Messaging gateway not configured - broadcasts will fail soft");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Probes and CORS preflight short-circuit before any routing
    match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            return Ok(routes::health_check())
        }
        (&Method::GET, "/version") => return Ok(routes::version_info()),
        (&Method::OPTIONS, _) => return Ok(cors_preflight()),
        _ => {}
    }

    // Each prefix router consumes the request when the path is its own and
    // returns None otherwise; the first match wins
    let response = if matches!(
        path.as_str(),
        "/api/register" | "/api/login" | "/api/logout" | "/api/me"
    ) {
        routes::handle_auth_request(req, state).await
    } else if path.starts_with("/api/reports") {
        routes::handle_report_request(req, state).await
    } else if path.starts_with("/api/sos_requests") {
        routes::handle_sos_request(req, state).await
    } else if path.starts_with("/api/notes") {
        routes::handle_note_request(req, state).await
    } else if path.starts_with("/api/announcements") || path == "/api/submit_announcement" {
        routes::handle_announcement_request(req, state).await
    } else if path.starts_with("/api/polygons") {
        routes::handle_polygon_request(req, state).await
    } else if path.starts_with("/api/villages") || path.starts_with("/api/village_status") {
        routes::handle_village_request(req, state).await
    } else if path == "/api/broadcast" {
        routes::handle_broadcast_request(req, state).await
    } else if path.starts_with("/api/uploads/") {
        routes::handle_upload_request(req, state).await
    } else {
        None
    };

    Ok(response.unwrap_or_else(|| {
        json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: format!("no route for {path}"),
                code: None,
            },
        )
    }))
}
