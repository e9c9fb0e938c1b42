//! Connection management: CRUD over the in-memory store, health checks
//! (ping, auth, discovery) and remote resource browsing.

pub mod handlers;
pub mod service;

pub use handlers::{configure_routes, ConnectionsApiDoc, ConnectionsState};
pub use service::{refresh_connection_health, ConnectionError};
