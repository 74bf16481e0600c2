//! SOS request schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for SOS requests
pub const SOS_COLLECTION: &str = "sos_requests";

/// Lifecycle state of an SOS request
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SosStatus {
    #[default]
    Active,
    Resolved,
}

impl fmt::Display for SosStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SosStatus::Active => write!(f, "active"),
            SosStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Emergency SOS signal from a villager
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SosDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the signalling identity
    pub owner_id: String,

    pub village_id: i64,

    #[serde(default)]
    pub message: String,

    pub latitude: f64,
    pub longitude: f64,

    #[serde(default)]
    pub status: SosStatus,
}

impl SosDoc {
    pub fn new(
        owner_id: String,
        village_id: i64,
        message: String,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            village_id,
            message,
            latitude,
            longitude,
            status: SosStatus::Active,
        }
    }
}

impl IntoIndexes for SosDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "village_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("sos_village_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("sos_owner_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SosDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
