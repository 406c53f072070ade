//! # Pedal Common Library
//!
//! Shared code for the pedal identification service:
//! - Identification result schema (versioned wire format)
//! - Result aggregation (totals, manufacturer grouping, chart dataset)
//! - Image data URI handling
//! - Capture/identify session state machine
//! - Configuration loading

pub mod aggregate;
pub mod config;
pub mod data_uri;
pub mod error;
pub mod model;
pub mod session;

pub use aggregate::{aggregate, AggregateReport, ChartEntry, ManufacturerAggregate};
pub use data_uri::DataUri;
pub use error::{Error, Result};
pub use model::{Advice, IdentificationResult, PedalIdentification};
