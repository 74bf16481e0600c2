//! Identity document schema
//!
//! Stores villager, head, and super identities. The password is only ever
//! stored as an Argon2 hash and is skipped on serialization to the wire by
//! the route layer (responses are built from explicit fields, never from
//! this document directly).

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::policy::Role;

/// Collection name for identities
pub const USER_COLLECTION: &str = "users";

/// Identity document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Stable external user identifier (alphanumeric, unique)
    pub real_id: String,

    /// Display name
    pub name: String,

    /// Email address (unique, login key)
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    /// Contact phone number, used for broadcast notifications
    pub phone: String,

    /// Caller role
    #[serde(default)]
    pub role: Role,

    /// Assigned village for villager/head roles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_village: Option<i64>,
}

impl UserDoc {
    pub fn new(
        real_id: String,
        name: String,
        email: String,
        password_hash: String,
        phone: String,
        role: Role,
        assigned_village: Option<i64>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            real_id,
            name,
            email,
            password_hash,
            phone,
            role,
            assigned_village,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "real_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("real_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "assigned_village": 1 },
                Some(
                    IndexOptions::builder()
                        .name("assigned_village_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
