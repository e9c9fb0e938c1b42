use portage_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Source connection failed: {0}")]
    Source(#[source] PlatformError),

    #[error("Destination connection failed: {0}")]
    Destination(#[source] PlatformError),

    #[error("Export failed: {0}")]
    Export(#[source] PlatformError),

    #[error("Preflight failed: {0}")]
    Preflight(#[source] PlatformError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("project sync status: {0}")]
    ProjectSync(String),

    #[error("timeout waiting for project sync")]
    ProjectSyncTimeout,

    #[error("Migration cancelled by user")]
    Cancelled,
}

impl MigrationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrationError::Cancelled)
    }
}
