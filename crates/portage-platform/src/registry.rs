//! Static resource-type registries per platform flavor.
//!
//! The `skip` sets carry the names that must never be deleted or migrated;
//! both flavors ship the same object model behind different URL prefixes.

use portage_core::{ConnectionType, ResourceType};

fn resources_for_prefix(prefix: &str, demo_skips: bool) -> Vec<ResourceType> {
    let p = |suffix: &str| format!("{prefix}{suffix}");
    let mut registry = vec![
        ResourceType::new("organizations", "Organizations", &p("organizations/"))
            .with_skip(&["Default"]),
        ResourceType::new("teams", "Teams", &p("teams/")),
        ResourceType::new("users", "Users", &p("users/")).with_skip(&["admin"]),
        ResourceType::new("credential_types", "Credential Types", &p("credential_types/")),
        ResourceType::new("credentials", "Credentials", &p("credentials/")),
        ResourceType::new("projects", "Projects", &p("projects/")),
        ResourceType::new("inventories", "Inventories", &p("inventories/")),
        ResourceType::new(
            "execution_environments",
            "Execution Environments",
            &p("execution_environments/"),
        )
        .with_skip(&[
            "Control Plane Execution Environment",
            "Default execution environment",
            "Ansible Engine 2.9 Execution Environment",
            "Minimal execution environment",
        ]),
        ResourceType::new("job_templates", "Job Templates", &p("job_templates/")),
        ResourceType::new("workflow_job_templates", "Workflows", &p("workflow_job_templates/")),
        ResourceType::new("schedules", "Schedules", &p("schedules/")),
    ];
    if demo_skips {
        for rt in registry.iter_mut() {
            match rt.name.as_str() {
                "credentials" => rt.skip.insert("Demo Credential".to_string()),
                "projects" => rt.skip.insert("Demo Project".to_string()),
                "inventories" => rt.skip.insert("Demo Inventory".to_string()),
                "job_templates" => rt.skip.insert("Demo Job Template".to_string()),
                _ => false,
            };
        }
    }
    registry
}

/// The AWX registry (`/api/v2/` paths, demo objects protected).
pub fn awx_resources() -> Vec<ResourceType> {
    resources_for_prefix(ConnectionType::Awx.api_prefix(), true)
}

/// The AAP registry (`/api/controller/v2/` paths).
pub fn aap_resources() -> Vec<ResourceType> {
    resources_for_prefix(ConnectionType::Aap.api_prefix(), true)
}

/// The registry for a connection type.
pub fn resources_for(conn_type: ConnectionType) -> Vec<ResourceType> {
    match conn_type {
        ConnectionType::Awx => awx_resources(),
        ConnectionType::Aap => aap_resources(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awx_paths_use_v2_prefix() {
        let registry = awx_resources();
        assert!(registry
            .iter()
            .all(|r| r.api_path.starts_with("/api/v2/")));
        let orgs = registry.iter().find(|r| r.name == "organizations").unwrap();
        assert_eq!(orgs.api_path, "/api/v2/organizations/");
        assert!(orgs.skip.contains("Default"));
    }

    #[test]
    fn test_aap_paths_use_controller_prefix() {
        let registry = aap_resources();
        assert!(registry
            .iter()
            .all(|r| r.api_path.starts_with("/api/controller/v2/")));
        let jts = registry.iter().find(|r| r.name == "job_templates").unwrap();
        assert_eq!(jts.api_path, "/api/controller/v2/job_templates/");
    }

    #[test]
    fn test_demo_objects_protected() {
        let registry = awx_resources();
        let creds = registry.iter().find(|r| r.name == "credentials").unwrap();
        assert!(creds.skip.contains("Demo Credential"));
        let users = registry.iter().find(|r| r.name == "users").unwrap();
        assert!(users.skip.contains("admin"));
    }
}
