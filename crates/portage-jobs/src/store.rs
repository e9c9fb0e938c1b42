//! In-memory thread-safe store for jobs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::job::Job;

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new running job.
    pub fn create(&self, job_type: &str, connection_id: &str) -> Arc<Job> {
        let job = Arc::new(Job::new(job_type, connection_id));
        self.jobs
            .write()
            .unwrap()
            .insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    /// All jobs, most recent first.
    pub fn list(&self) -> Vec<Arc<Job>> {
        let mut jobs: Vec<Arc<Job>> = self.jobs.read().unwrap().values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let job = store.create("migration-preview", "conn-1");
        assert_eq!(job.status(), JobStatus::Running);
        assert!(job.logs_since(0).is_empty());

        let got = store.get(&job.id).expect("job not found");
        assert_eq!(got.job_type, "migration-preview");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_list_most_recent_first() {
        let store = JobStore::new();
        let first = store.create("a", "c");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store.create("b", "c");

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }
}
