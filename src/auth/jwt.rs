//! Session tokens
//!
//! HS256-signed, time-bounded tokens embedding the caller's external
//! identifier as subject and their role as a claim. Every token carries a
//! unique `jti`; logout adds that id to a revocation set that is checked on
//! every validation, so a revoked token fails even while its signature and
//! expiry are still good.
//!
//! The revocation set lives in process memory and is owned by the
//! [`TokenService`] instance (injected, not a global) - a restart forgets
//! revocations, which is an accepted limitation since expiry bounds the
//! exposure window.

use dashmap::DashSet;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::policy::Role;
use crate::types::VemsError;

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// External user identifier
    pub sub: String,
    /// Caller role at issue time
    pub role: Role,
    /// Unique token identifier, target of revocation
    pub jti: String,
    /// Issued-at (unix seconds)
    pub iat: u64,
    /// Expiry (unix seconds)
    pub exp: u64,
}

/// Result of verifying a token
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    fn ok(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// Concurrent set of revoked token identifiers.
///
/// Entries are added on logout and never pruned here; token expiry is the
/// natural cleanup signal, so growth is bounded by the expiry window times
/// the logout rate.
#[derive(Debug, Default)]
pub struct RevocationSet {
    revoked: DashSet<String>,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token id to the set. Idempotent; returns false when the id was
    /// already present.
    pub fn revoke(&self, jti: &str) -> bool {
        self.revoked.insert(jti.to_string())
    }

    pub fn contains(&self, jti: &str) -> bool {
        self.revoked.contains(jti)
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

/// Issues and validates session tokens
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
    revoked: Arc<RevocationSet>,
}

impl TokenService {
    pub fn new(secret: &str, expiry_seconds: u64, revoked: Arc<RevocationSet>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
            revoked,
        }
    }

    /// Issue a signed token for an identity. No storage side effect.
    pub fn issue(&self, real_id: &str, role: Role) -> Result<(String, Claims), VemsError> {
        let now = unix_now();
        let claims = Claims {
            sub: real_id.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| VemsError::Authentication(format!("failed to sign token: {e}")))?;

        Ok((token, claims))
    }

    /// Verify signature and expiry, then check the revocation set.
    pub fn validate(&self, token: &str) -> TokenValidationResult {
        let claims = match self.decode(token) {
            Ok(claims) => claims,
            Err(e) => return TokenValidationResult::invalid(e),
        };

        if self.revoked.contains(&claims.jti) {
            return TokenValidationResult::invalid("token has been revoked");
        }

        TokenValidationResult::ok(claims)
    }

    /// Verify signature and expiry only, skipping the revocation check.
    /// Used by logout so revoking an already-revoked token stays a no-op
    /// instead of a failure.
    pub fn decode(&self, token: &str) -> Result<Claims, String> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| format!("invalid token: {e}"))
    }

    /// Revoke a token id. Idempotent.
    pub fn revoke(&self, jti: &str) -> bool {
        self.revoked.revoke(jti)
    }

    pub fn revocations(&self) -> &RevocationSet {
        &self.revoked
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 3600, Arc::new(RevocationSet::new()))
    }

    #[test]
    fn test_issue_and_validate_round_trip() {
        let svc = service();
        let (token, claims) = svc.issue("USR001", Role::Head).unwrap();

        let result = svc.validate(&token);
        assert!(result.valid, "unexpected error: {:?}", result.error);

        let decoded = result.claims.unwrap();
        assert_eq!(decoded.sub, "USR001");
        assert_eq!(decoded.role, Role::Head);
        assert_eq!(decoded.jti, claims.jti);
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc = service();
        let (token, _) = svc.issue("USR001", Role::Villager).unwrap();

        let other = TokenService::new("other-secret", 3600, Arc::new(RevocationSet::new()));
        assert!(!other.validate(&token).valid);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let svc = service();
        assert!(!svc.validate("not-a-token").valid);
        assert!(!svc.validate("").valid);
    }

    #[test]
    fn test_revoked_token_fails_while_signature_still_valid() {
        let svc = service();
        let (token, claims) = svc.issue("USR001", Role::Villager).unwrap();
        assert!(svc.validate(&token).valid);

        assert!(svc.revoke(&claims.jti));
        let result = svc.validate(&token);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("revoked"));
    }

    #[test]
    fn test_decode_skips_revocation_check() {
        let svc = service();
        let (token, claims) = svc.issue("USR001", Role::Villager).unwrap();
        svc.revoke(&claims.jti);

        assert!(!svc.validate(&token).valid);
        assert_eq!(svc.decode(&token).unwrap().jti, claims.jti);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let svc = service();
        let (_, claims) = svc.issue("USR001", Role::Villager).unwrap();

        assert!(svc.revoke(&claims.jti));
        assert!(!svc.revoke(&claims.jti));
        assert_eq!(svc.revocations().len(), 1);
    }

    #[test]
    fn test_revocation_set_is_shared_across_clones_of_the_arc() {
        let revoked = Arc::new(RevocationSet::new());
        let a = TokenService::new("s", 3600, Arc::clone(&revoked));
        let b = TokenService::new("s", 3600, Arc::clone(&revoked));

        let (token, claims) = a.issue("USR001", Role::Super).unwrap();
        a.revoke(&claims.jti);
        assert!(!b.validate(&token).valid);
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let now = unix_now();
        let claims = Claims {
            sub: "USR001".into(),
            role: Role::Villager,
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let result = svc.validate(&token);
        assert!(!result.valid);
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn test_concurrent_revocation_keeps_all_entries() {
        let revoked = Arc::new(RevocationSet::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let set = Arc::clone(&revoked);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    set.revoke(&format!("jti-{i}-{j}"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(revoked.len(), 800);
    }
}
