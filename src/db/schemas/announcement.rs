//! Announcement schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for announcements
pub const ANNOUNCEMENT_COLLECTION: &str = "announcements";

/// Announcement to one village, or to every village when `village_id` is
/// absent (global)
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AnnouncementDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the authoring identity
    pub owner_id: String,

    /// Target village; `None` means globally visible to every role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub village_id: Option<i64>,

    pub title: String,

    pub content: String,
}

impl AnnouncementDoc {
    pub fn new(owner_id: String, village_id: Option<i64>, title: String, content: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            village_id,
            title,
            content,
        }
    }
}

impl IntoIndexes for AnnouncementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "village_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("announcement_village_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for AnnouncementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
