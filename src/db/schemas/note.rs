//! Administrative note schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for notes
pub const NOTE_COLLECTION: &str = "notes";

/// Village head's administrative note
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NoteDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the authoring head
    pub owner_id: String,

    pub village_id: i64,

    pub title: String,

    pub content: String,
}

impl NoteDoc {
    pub fn new(owner_id: String, village_id: i64, title: String, content: String) -> Self {
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

impl IntoIndexes for NoteDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "village_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("note_village_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NoteDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
