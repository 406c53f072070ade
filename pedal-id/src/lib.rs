//! pedal-id library interface
//!
//! Exposes the router, shared state and vision client for the binary and for
//! integration tests.

pub mod api;
pub mod error;
pub mod sessions;
pub mod view;
pub mod vision;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use pedal_common::config::ServiceConfig;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::sessions::SessionStore;
use crate::vision::PedalIdentifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// Vision model (or a stub in tests)
    pub identifier: Arc<dyn PedalIdentifier>,
    /// Capture/identify sessions, one per open page
    pub sessions: SessionStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: ServiceConfig, identifier: Arc<dyn PedalIdentifier>) -> Self {
        Self {
            config: Arc::new(config),
            identifier,
            sessions: SessionStore::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Record an error for /health
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::identify_routes())
        .merge(api::session_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
