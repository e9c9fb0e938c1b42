//! Breadth-first export of all migratable resources from the source.

use std::collections::HashMap;

use portage_core::Resource;
use portage_platform::ApiClient;

use crate::data::ExportedData;
use crate::error::MigrationError;
use crate::service::Logger;

/// Default/system resource names dropped during export. This table is the
/// single source of truth for migration-time skips; the per-flavor
/// registries only carry delete protection.
fn skip_names(type_name: &str) -> &'static [&'static str] {
    match type_name {
        "organizations" => &["Default"],
        "users" => &["admin"],
        "credentials" => &["Demo Credential", "Ansible Galaxy"],
        "projects" => &["Demo Project"],
        "inventories" => &["Demo Inventory"],
        "job_templates" => &["Demo Job Template"],
        _ => &[],
    }
}

const SKIP_TYPES: &[&str] = &[
    "organizations",
    "users",
    "credentials",
    "projects",
    "inventories",
    "job_templates",
];

/// The default resource names skipped during migration export, keyed by type.
pub fn default_exclusions() -> HashMap<String, Vec<String>> {
    SKIP_TYPES
        .iter()
        .map(|t| {
            (
                t.to_string(),
                skip_names(t).iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

/// Fetches all migratable resource types from the source into memory, in
/// breadth-first dependency order. Child-list failures (one inventory's
/// hosts, one workflow's nodes) are logged and skipped; top-level list
/// failures abort the export.
pub async fn export_all(
    client: &ApiClient,
    prefix: &str,
    log: Logger<'_>,
) -> Result<ExportedData, MigrationError> {
    let mut data = ExportedData::default();

    data.organizations =
        fetch_filtered(client, &format!("{prefix}organizations/"), "organizations", log).await?;
    data.teams = fetch_filtered(client, &format!("{prefix}teams/"), "teams", log).await?;
    data.users = fetch_filtered(client, &format!("{prefix}users/"), "users", log).await?;

    // Credential types: custom only. Managed types exist intrinsically on
    // every control plane and must not be duplicated.
    log("Exporting credential_types...");
    let all_cred_types = client
        .get_all(&format!("{prefix}credential_types/"))
        .await
        .map_err(MigrationError::Export)?;
    data.credential_types = all_cred_types
        .into_iter()
        .filter(|ct| !ct.bool_field("managed"))
        .collect();
    log(&format!(
        "  {} custom credential types",
        data.credential_types.len()
    ));

    data.credentials =
        fetch_filtered(client, &format!("{prefix}credentials/"), "credentials", log).await?;
    data.projects = fetch_filtered(client, &format!("{prefix}projects/"), "projects", log).await?;
    data.inventories =
        fetch_filtered(client, &format!("{prefix}inventories/"), "inventories", log).await?;

    // Hosts and groups per inventory
    for inv in &data.inventories {
        let inv_id = inv.id();
        let inv_name = inv.name();

        let hosts = match client
            .get_all(&format!("{prefix}inventories/{inv_id}/hosts/"))
            .await
        {
            Ok(hosts) => hosts,
            Err(e) => {
                log(&format!(
                    "  WARNING: failed to get hosts for inventory {inv_name}: {e}"
                ));
                continue;
            }
        };

        let groups = match client
            .get_all(&format!("{prefix}inventories/{inv_id}/groups/"))
            .await
        {
            Ok(groups) => groups,
            Err(e) => {
                data.hosts.insert(inv_id, hosts);
                log(&format!(
                    "  WARNING: failed to get groups for inventory {inv_name}: {e}"
                ));
                continue;
            }
        };

        for group in &groups {
            let group_id = group.id();
            let Ok(group_hosts) = client
                .get_all(&format!("{prefix}groups/{group_id}/hosts/"))
                .await
            else {
                continue;
            };
            data.group_hosts
                .entry(group_id)
                .or_default()
                .extend(group_hosts.iter().map(|h| h.id()));
        }

        log(&format!(
            "  Inventory {inv_name}: {} hosts, {} groups",
            hosts.len(),
            groups.len()
        ));
        data.hosts.insert(inv_id, hosts);
        data.groups.insert(inv_id, groups);
    }

    data.job_templates =
        fetch_filtered(client, &format!("{prefix}job_templates/"), "job_templates", log).await?;

    // Surveys for job templates
    for jt in &data.job_templates {
        if jt.bool_field("survey_enabled") {
            let jt_id = jt.id();
            if let Ok(survey) = client
                .get_json::<Resource>(&format!("{prefix}job_templates/{jt_id}/survey_spec/"), &[])
                .await
            {
                data.surveys.insert(jt_id, survey);
            }
        }
    }

    data.workflow_jts = fetch_filtered(
        client,
        &format!("{prefix}workflow_job_templates/"),
        "workflow_job_templates",
        log,
    )
    .await?;

    // Workflow nodes and surveys
    for wf in &data.workflow_jts {
        let wf_id = wf.id();
        let wf_name = wf.name();

        match client
            .get_all(&format!("{prefix}workflow_job_templates/{wf_id}/workflow_nodes/"))
            .await
        {
            Ok(nodes) => {
                log(&format!("  Workflow {wf_name}: {} nodes", nodes.len()));
                data.workflow_nodes.insert(wf_id, nodes);
            }
            Err(e) => {
                log(&format!(
                    "  WARNING: failed to get nodes for workflow {wf_name}: {e}"
                ));
                continue;
            }
        }

        if wf.bool_field("survey_enabled") {
            if let Ok(survey) = client
                .get_json::<Resource>(
                    &format!("{prefix}workflow_job_templates/{wf_id}/survey_spec/"),
                    &[],
                )
                .await
            {
                data.surveys.insert(wf_id, survey);
            }
        }
    }

    // Schedules: keep only those whose parent was exported, so excluded or
    // managed objects don't leave dangling references.
    log("Exporting schedules...");
    let all_schedules = client
        .get_all(&format!("{prefix}schedules/"))
        .await
        .map_err(MigrationError::Export)?;
    let exported_parents: std::collections::HashSet<&str> = data
        .job_templates
        .iter()
        .chain(data.workflow_jts.iter())
        .map(|r| r.name())
        .collect();
    data.schedules = all_schedules
        .into_iter()
        .filter(|sched| {
            let parent = sched.unified_job_template_name();
            !parent.is_empty() && exported_parents.contains(parent)
        })
        .collect();
    log(&format!("  {} schedules", data.schedules.len()));

    // Org and team memberships, by username (admin excluded)
    log("Exporting user associations...");
    for org in &data.organizations {
        let org_id = org.id();
        let Ok(users) = client
            .get_all(&format!("{prefix}organizations/{org_id}/users/"))
            .await
        else {
            continue;
        };
        for user in users {
            let username = user.str_field_or_empty("username");
            if !username.is_empty() && username != "admin" {
                data.org_users
                    .entry(org_id)
                    .or_default()
                    .push(username.to_string());
            }
        }
    }
    for team in &data.teams {
        let team_id = team.id();
        let Ok(users) = client
            .get_all(&format!("{prefix}teams/{team_id}/users/"))
            .await
        else {
            continue;
        };
        for user in users {
            let username = user.str_field_or_empty("username");
            if !username.is_empty() && username != "admin" {
                data.team_users
                    .entry(team_id)
                    .or_default()
                    .push(username.to_string());
            }
        }
    }

    Ok(data)
}

/// Fetches all resources of a type, dropping defaults by name and anything
/// without a natural key.
async fn fetch_filtered(
    client: &ApiClient,
    path: &str,
    type_name: &str,
    log: Logger<'_>,
) -> Result<Vec<Resource>, MigrationError> {
    log(&format!("Exporting {type_name}..."));
    let all = client.get_all(path).await.map_err(MigrationError::Export)?;
    let total = all.len();

    let skip = skip_names(type_name);
    let mut filtered = Vec::new();
    for resource in all {
        let name = resource.name();
        if name.is_empty() {
            log(&format!("  WARNING: skipping {type_name} entry without a name"));
            continue;
        }
        if skip.contains(&name) {
            continue;
        }
        filtered.push(resource);
    }
    log(&format!(
        "  {} {type_name} (skipped {} defaults)",
        filtered.len(),
        total - filtered.len()
    ));
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exclusions() {
        let exclusions = default_exclusions();
        assert!(exclusions["organizations"].contains(&"Default".to_string()));
        assert!(exclusions["users"].contains(&"admin".to_string()));
        assert!(exclusions["credentials"].contains(&"Ansible Galaxy".to_string()));
        assert!(!exclusions.contains_key("teams"));
    }
}
