//! HTTP routes for the VEMS backend

pub mod announcements;
pub mod auth_routes;
pub mod broadcast;
pub mod health;
pub mod notes;
pub mod polygons;
pub mod reports;
pub mod sos;
pub mod uploads;
pub mod util;
pub mod villages;

pub use announcements::handle_announcement_request;
pub use auth_routes::handle_auth_request;
pub use broadcast::handle_broadcast_request;
pub use health::{health_check, version_info};
pub use notes::handle_note_request;
pub use polygons::handle_polygon_request;
pub use reports::handle_report_request;
pub use sos::handle_sos_request;
pub use uploads::handle_upload_request;
pub use villages::handle_village_request;
