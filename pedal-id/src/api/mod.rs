//! HTTP API handlers for pedal-id

pub mod health;
pub mod identify;
pub mod session;
pub mod ui;

pub use health::health_routes;
pub use identify::identify_routes;
pub use session::session_routes;
pub use ui::ui_routes;
