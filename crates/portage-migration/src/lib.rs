//! The migration engine: a two-phase pipeline (export + preflight, then
//! dependency-ordered import) between two automation control planes, plus
//! the HTTP surface that runs it as cancellable jobs.

pub mod data;
pub mod error;
pub mod export;
pub mod handlers;
pub mod import;
pub mod preflight;
pub mod preview_store;
pub mod service;

pub use data::{
    ExclusionMap, ExportedData, MigrationAction, MigrationPreview, MigrationResource,
};
pub use error::MigrationError;
pub use export::default_exclusions;
pub use handlers::{configure_routes, MigrationApiDoc, MigrationState};
pub use preview_store::{PreviewEntry, PreviewStore};
pub use service::{preview, run, Logger};
