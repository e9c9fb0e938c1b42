//! Hands the exported graph and preflight decisions from the preview job to
//! the run job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::data::{ExportedData, MigrationPreview};

/// The preview result and exported data, cached between the preview and run
/// steps under the preview job's ID.
pub struct PreviewEntry {
    pub preview: MigrationPreview,
    pub data: ExportedData,
}

/// Written once by the preview job, read by the run job, deleted after the
/// run completes.
#[derive(Default)]
pub struct PreviewStore {
    previews: RwLock<HashMap<String, Arc<PreviewEntry>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, job_id: &str, entry: PreviewEntry) {
        self.previews
            .write()
            .unwrap()
            .insert(job_id.to_string(), Arc::new(entry));
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<PreviewEntry>> {
        self.previews.read().unwrap().get(job_id).cloned()
    }

    pub fn delete(&self, job_id: &str) {
        self.previews.write().unwrap().remove(job_id);
    }
}
