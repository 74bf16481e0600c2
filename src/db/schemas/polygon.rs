//! Hazard polygon schema
//!
//! Stores raw polygon coordinates for a village's hazard zones. No
//! geographic computation happens here; the points are carried as-is.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for hazard polygons
pub const POLYGON_COLLECTION: &str = "polygons";

/// Raw coordinate pair
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Hazard polygon drawn by a village head
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PolygonDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// `real_id` of the authoring head
    pub owner_id: String,

    pub village_id: i64,

    pub name: String,

    /// Free-form hazard tag, e.g. "flood", "landslide"
    #[serde(default)]
    pub hazard_kind: String,

    /// Polygon vertices in submission order
    #[serde(default)]
    pub points: Vec<GeoPoint>,
}

impl PolygonDoc {
    pub fn new(
        owner_id: String,
        village_id: i64,
        name: String,
        hazard_kind: String,
        points: Vec<GeoPoint>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            village_id,
            name,
            hazard_kind,
            points,
        }
    }
}

impl IntoIndexes for PolygonDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "village_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("polygon_village_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PolygonDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
