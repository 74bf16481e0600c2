//! Database schemas for the VEMS backend
//!
//! One document type per collection: identities, villages, super-role scope
//! assignments, and the five incident-like entities.

mod announcement;
mod metadata;
mod note;
mod polygon;
mod report;
mod sos;
mod sup_access;
mod user;
mod village;

pub use announcement::{AnnouncementDoc, ANNOUNCEMENT_COLLECTION};
pub use metadata::Metadata;
pub use note::{NoteDoc, NOTE_COLLECTION};
pub use polygon::{GeoPoint, PolygonDoc, POLYGON_COLLECTION};
pub use report::{ReportDoc, REPORT_COLLECTION};
pub use sos::{SosDoc, SosStatus, SOS_COLLECTION};
pub use sup_access::{SupAccessDoc, SUP_ACCESS_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
pub use village::{VillageDoc, VILLAGE_COLLECTION};
