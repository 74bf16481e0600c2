//! Super-role scope assignment schema
//!
//! One-to-one with a super identity. Absence of a document means empty
//! scope: the super sees nothing, which is not an error.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for scope assignments
pub const SUP_ACCESS_COLLECTION: &str = "sup_access";

/// Scope assignment for a super identity
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SupAccessDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the super identity (unique - at most one assignment)
    pub user_id: String,

    /// Villages the identity may act on
    #[serde(default)]
    pub village_ids: Vec<i64>,
}

impl SupAccessDoc {
    pub fn new(user_id: String, village_ids: Vec<i64>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            village_ids,
        }
    }
}

impl IntoIndexes for SupAccessDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("sup_access_user_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for SupAccessDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
