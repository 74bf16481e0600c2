//! Authentication for the VEMS backend
//!
//! Provides:
//! - JWT session tokens carrying identity + role, with an in-process
//!   revocation set for logout
//! - Password hashing with Argon2
//! - Registration input validation

pub mod jwt;
pub mod password;
pub mod validation;

pub use jwt::{extract_token_from_header, Claims, RevocationSet, TokenService, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use validation::validate_registration;
