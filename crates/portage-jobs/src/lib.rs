//! Async job runtime: lifecycle, append-only log buffer, cancellation and
//! WebSocket log streaming.

pub mod handlers;
pub mod job;
pub mod store;
mod ws;

pub use handlers::{configure_routes, ws_routes, JobsApiDoc, JobsState};
pub use job::{Job, JobStatus, JobView, LogSink};
pub use store::JobStore;
