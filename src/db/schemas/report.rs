//! Incident report schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for incident reports
pub const REPORT_COLLECTION: &str = "reports";

/// Incident report submitted by a villager or head
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ReportDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the submitting identity
    pub owner_id: String,

    /// Village the incident is attributed to
    pub village_id: i64,

    pub title: String,

    #[serde(default)]
    pub category: String,

    pub description: String,

    /// Raw incident coordinates; no geographic computation is done on them
    pub latitude: f64,
    pub longitude: f64,

    /// Stored attachment file names (at most 3)
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl ReportDoc {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: String,
        village_id: i64,
        title: String,
        category: String,
        description: String,
        latitude: f64,
        longitude: f64,
        attachments: Vec<String>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            village_id,
            title,
            category,
            description,
            latitude,
            longitude,
            attachments,
        }
    }
}

impl IntoIndexes for ReportDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "village_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("report_village_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("report_owner_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ReportDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
