//! Village document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for villages
pub const VILLAGE_COLLECTION: &str = "villages";

/// Village document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct VillageDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Numeric village identifier (unique)
    pub village_id: i64,

    /// Village name (unique)
    pub name: String,

    #[serde(default)]
    pub population: i64,

    /// Free-form emergency status tag, e.g. "Normal", "High Alert", "Critical"
    #[serde(default = "default_emergency_status")]
    pub emergency_status: String,

    /// Free-form service status tag, e.g. "Operational", "Maintenance", "Down"
    #[serde(default = "default_service_status")]
    pub service_status: String,

    /// Running counter of reports submitted today. Incremented atomically
    /// with report insertion; reset policy is external to this service.
    #[serde(default)]
    pub todays_reports: i64,
}

fn default_emergency_status() -> String {
    "Normal".to_string()
}

fn default_service_status() -> String {
    "Operational".to_string()
}

impl VillageDoc {
    pub fn new(village_id: i64, name: String, population: i64) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            village_id,
            name,
            population,
            emergency_status: default_emergency_status(),
            service_status: default_service_status(),
            todays_reports: 0,
        }
    }
}

impl IntoIndexes for VillageDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "village_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("village_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("village_name_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for VillageDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
