//! Core models and types shared across all Portage crates

pub mod connection;
pub mod problem;
pub mod resource;

pub use connection::{Connection, ConnectionStore, ConnectionType, HealthStatus};
pub use problem::Problem;
pub use resource::{Resource, ResourceType};

// Re-export external dependencies used in public signatures
pub use chrono;
pub use serde_json;
