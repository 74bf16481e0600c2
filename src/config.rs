//! Configuration for the VEMS backend
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// VEMS - village emergency management backend
#[derive(Parser, Debug, Clone)]
#[command(name = "vems")]
#[command(about = "Role-scoped incident reporting backend for village emergency management")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "vems")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Enable development mode (insecure default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Directory for uploaded report attachments
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    /// Maximum request body size in bytes (report submissions carry
    /// base64-encoded attachments)
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "16777216")]
    pub max_body_bytes: usize,

    /// Outbound messaging gateway URL for broadcast notifications
    /// (e.g. "http://localhost:9090/send"). Broadcasts fail soft when unset.
    #[arg(long, env = "GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["vems", "--jwt-secret", "test-secret"])
    }

    #[test]
    fn test_defaults_valid() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_expiry_seconds, 3600);
        assert_eq!(args.jwt_secret(), "test-secret");
    }

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["vems"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_dev_mode_falls_back_to_default_secret() {
        let args = Args::parse_from(["vems", "--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_secret(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let args = Args::parse_from(["vems", "--jwt-secret", "s", "--jwt-expiry-seconds", "0"]);
        assert!(args.validate().is_err());
    }
}
