//! The in-memory migration graph and the preview model.

use std::collections::HashMap;

use portage_core::Resource;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Resource names to drop per type, keyed by type name.
pub type ExclusionMap = HashMap<String, Vec<String>>;

/// Everything fetched from the source, in memory. Map keys are always
/// source-side IDs; cross-references inside the graph resolve by natural
/// key (name, or username for users) because destination IDs are unknown
/// until import.
#[derive(Debug, Default)]
pub struct ExportedData {
    pub organizations: Vec<Resource>,
    pub teams: Vec<Resource>,
    pub users: Vec<Resource>,
    pub credential_types: Vec<Resource>,
    pub credentials: Vec<Resource>,
    pub projects: Vec<Resource>,
    pub inventories: Vec<Resource>,
    /// inventory source ID → hosts
    pub hosts: HashMap<i64, Vec<Resource>>,
    /// inventory source ID → groups
    pub groups: HashMap<i64, Vec<Resource>>,
    /// group source ID → host source IDs
    pub group_hosts: HashMap<i64, Vec<i64>>,
    pub job_templates: Vec<Resource>,
    /// JT/WFJT source ID → survey spec
    pub surveys: HashMap<i64, Resource>,
    pub workflow_jts: Vec<Resource>,
    /// WFJT source ID → nodes
    pub workflow_nodes: HashMap<i64, Vec<Resource>>,
    pub schedules: Vec<Resource>,
    /// org source ID → usernames
    pub org_users: HashMap<i64, Vec<String>>,
    /// team source ID → usernames
    pub team_users: HashMap<i64, Vec<String>>,
}

impl ExportedData {
    /// The top-level list for a preview type name.
    pub fn for_type(&self, type_name: &str) -> &[Resource] {
        match type_name {
            "organizations" => &self.organizations,
            "teams" => &self.teams,
            "users" => &self.users,
            "credential_types" => &self.credential_types,
            "credentials" => &self.credentials,
            "projects" => &self.projects,
            "inventories" => &self.inventories,
            "job_templates" => &self.job_templates,
            "workflow_job_templates" => &self.workflow_jts,
            "schedules" => &self.schedules,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAction {
    Create,
    SkipExists,
}

/// A single object being considered for migration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MigrationResource {
    pub source_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub action: MigrationAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_id: Option<i64>,
}

/// The result of the export + preflight check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MigrationPreview {
    pub source_id: String,
    pub destination_id: String,
    pub resources: HashMap<String, Vec<MigrationResource>>,
    pub warnings: Vec<String>,
}

impl MigrationPreview {
    /// Counts of planned creates and skips.
    pub fn totals(&self) -> (usize, usize) {
        let mut create = 0;
        let mut skip = 0;
        for items in self.resources.values() {
            for item in items {
                match item.action {
                    MigrationAction::Create => create += 1,
                    MigrationAction::SkipExists => skip += 1,
                }
            }
        }
        (create, skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MigrationAction::SkipExists).unwrap(),
            "\"skip_exists\""
        );
        assert_eq!(
            serde_json::to_string(&MigrationAction::Create).unwrap(),
            "\"create\""
        );
    }

    #[test]
    fn test_totals() {
        let mut preview = MigrationPreview::default();
        preview.resources.insert(
            "organizations".to_string(),
            vec![
                MigrationResource {
                    source_id: 1,
                    name: "Acme".to_string(),
                    resource_type: "organizations".to_string(),
                    action: MigrationAction::Create,
                    dest_id: None,
                },
                MigrationResource {
                    source_id: 2,
                    name: "Ops".to_string(),
                    resource_type: "organizations".to_string(),
                    action: MigrationAction::SkipExists,
                    dest_id: Some(9),
                },
            ],
        );
        assert_eq!(preview.totals(), (1, 1));
    }
}
