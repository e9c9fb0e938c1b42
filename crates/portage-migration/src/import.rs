//! Dependency-ordered import into the destination.
//!
//! Source and destination ID spaces are unrelated; every cross-reference is
//! resolved by natural key through the per-kind tables below, built
//! incrementally as entities are created or adopted. A reference that
//! resolves to zero is omitted from the payload, never sent as `0`.

use std::collections::HashMap;
use std::time::Duration;

use portage_core::{ConnectionType, Resource};
use portage_platform::{ApiClient, PlatformError};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::data::{ExclusionMap, ExportedData, MigrationAction, MigrationPreview};
use crate::error::MigrationError;
use crate::service::Logger;

const PROJECT_SYNC_POLL: Duration = Duration::from_secs(3);
const PROJECT_SYNC_TIMEOUT: Duration = Duration::from_secs(120);

/// Natural key → destination ID tables, one per resource kind. Hosts and
/// groups key by `"<inventory>/<name>"` to avoid cross-inventory collisions.
/// Credential types additionally map source ID → destination ID because a
/// credential references its type by ID; workflow nodes map source node ID →
/// destination node ID for the edge-wiring pass.
#[derive(Default)]
struct IdMap {
    orgs: HashMap<String, i64>,
    teams: HashMap<String, i64>,
    users: HashMap<String, i64>,
    cred_types: HashMap<String, i64>,
    creds: HashMap<String, i64>,
    projects: HashMap<String, i64>,
    invs: HashMap<String, i64>,
    hosts: HashMap<String, i64>,
    groups: HashMap<String, i64>,
    jts: HashMap<String, i64>,
    wfjts: HashMap<String, i64>,
    cred_type_by_src_id: HashMap<i64, i64>,
    nodes: HashMap<i64, i64>,
}

/// The preview action for a resource, defaulting to create.
fn action_for(preview: &MigrationPreview, type_name: &str, name: &str) -> (MigrationAction, i64) {
    if let Some(items) = preview.resources.get(type_name) {
        for item in items {
            if item.name == name {
                return (item.action, item.dest_id.unwrap_or(0));
            }
        }
    }
    (MigrationAction::Create, 0)
}

fn is_excluded(exclude: &ExclusionMap, type_name: &str, name: &str) -> bool {
    exclude
        .get(type_name)
        .is_some_and(|names| names.iter().any(|n| n == name))
}

/// The one cancellation check, used before every phase and every per-item
/// network call.
fn check_cancelled(cancel: &CancellationToken, log: Logger<'_>) -> Result<(), MigrationError> {
    if cancel.is_cancelled() {
        log("Migration cancelled by user");
        return Err(MigrationError::Cancelled);
    }
    Ok(())
}

/// POSTs a payload and returns the new resource's ID.
async fn create_resource(
    client: &ApiClient,
    path: &str,
    payload: &Value,
) -> Result<i64, PlatformError> {
    let (body, _status) = client.post(path, payload).await?;
    let created: Resource = serde_json::from_str(&body).map_err(|e| PlatformError::Parse {
        path: path.to_string(),
        detail: e.to_string(),
    })?;
    Ok(created.id())
}

fn passthrough(r: &Resource, field: &str) -> Value {
    r.get(field).cloned().unwrap_or(Value::Null)
}

/// Creates resources on the destination in strict dependency order.
/// Per-item failures are logged and the loop advances; only cancellation or
/// a connectivity failure at a phase boundary aborts.
#[allow(clippy::too_many_arguments)]
pub async fn import_all(
    dst: &ApiClient,
    prefix: &str,
    dst_type: ConnectionType,
    data: &ExportedData,
    preview: &MigrationPreview,
    exclude: &ExclusionMap,
    cancel: &CancellationToken,
    log: Logger<'_>,
) -> Result<(), MigrationError> {
    let mut ids = IdMap::default();

    // Preload credential type names from the destination (managed and
    // custom both), so credentials referencing a managed type resolve.
    if let Ok(dest_cred_types) = dst.get_all(&format!("{prefix}credential_types/")).await {
        for ct in dest_cred_types {
            ids.cred_types.insert(ct.name().to_string(), ct.id());
        }
    }

    // 1. Organizations
    check_cancelled(cancel, log)?;
    log("=== Importing organizations ===");
    for org in &data.organizations {
        check_cancelled(cancel, log)?;
        let name = org.name();
        if is_excluded(exclude, "organizations", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "organizations", name);
        if action != MigrationAction::Create {
            ids.orgs.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let payload = json!({
            "name": name,
            "description": org.str_field_or_empty("description"),
        });
        match create_resource(dst, &format!("{prefix}organizations/"), &payload).await {
            Ok(id) => {
                ids.orgs.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 2. Credential types (custom only)
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing credential types ===");
    for ct in &data.credential_types {
        check_cancelled(cancel, log)?;
        let name = ct.name();
        if is_excluded(exclude, "credential_types", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "credential_types", name);
        if action != MigrationAction::Create {
            ids.cred_types.insert(name.to_string(), dest_id);
            ids.cred_type_by_src_id.insert(ct.id(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let payload = json!({
            "name": name,
            "description": ct.str_field_or_empty("description"),
            "kind": ct.str_field_or_empty("kind"),
            "inputs": passthrough(ct, "inputs"),
            "injectors": passthrough(ct, "injectors"),
        });
        match create_resource(dst, &format!("{prefix}credential_types/"), &payload).await {
            Ok(id) => {
                ids.cred_types.insert(name.to_string(), id);
                ids.cred_type_by_src_id.insert(ct.id(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 3. Users (natural key is the username)
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing users ===");
    for user in &data.users {
        check_cancelled(cancel, log)?;
        let name = user.str_field_or_empty("username");
        if is_excluded(exclude, "users", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "users", name);
        if action != MigrationAction::Create {
            ids.users.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let payload = json!({
            "username": name,
            "first_name": user.str_field_or_empty("first_name"),
            "last_name": user.str_field_or_empty("last_name"),
            "email": user.str_field_or_empty("email"),
            "is_superuser": false,
            "password": "changeme!",
        });
        match create_resource(dst, &format!("{prefix}users/"), &payload).await {
            Ok(id) => {
                ids.users.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 4. Teams
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing teams ===");
    for team in &data.teams {
        check_cancelled(cancel, log)?;
        let name = team.name();
        if is_excluded(exclude, "teams", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "teams", name);
        if action != MigrationAction::Create {
            ids.teams.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let org_name = team.org_name();
        let org_id = ids.orgs.get(org_name).copied().unwrap_or(0);
        if org_id == 0 {
            log(&format!("  SKIP: {name} (org {org_name:?} not found)"));
            continue;
        }
        let payload = json!({
            "name": name,
            "description": team.str_field_or_empty("description"),
            "organization": org_id,
        });
        match create_resource(dst, &format!("{prefix}teams/"), &payload).await {
            Ok(id) => {
                ids.teams.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 5. Credentials. Secrets cannot be read back from the source API, so
    // inputs are always POSTed empty.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing credentials ===");
    for cred in &data.credentials {
        check_cancelled(cancel, log)?;
        let name = cred.name();
        if is_excluded(exclude, "credentials", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "credentials", name);
        if action != MigrationAction::Create {
            ids.creds.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let org_id = ids.orgs.get(cred.org_name()).copied().unwrap_or(0);

        // Resolve the credential type by source ID first, then by name.
        let src_ct_id = cred.int_field("credential_type");
        let mut dest_ct_id = ids.cred_type_by_src_id.get(&src_ct_id).copied().unwrap_or(0);
        if dest_ct_id == 0 {
            dest_ct_id = ids
                .cred_types
                .get(cred.credential_type_name())
                .copied()
                .unwrap_or(0);
        }
        if dest_ct_id == 0 {
            log(&format!("  SKIP: {name} (credential type not found)"));
            continue;
        }

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        payload.insert(
            "description".to_string(),
            json!(cred.str_field_or_empty("description")),
        );
        payload.insert("credential_type".to_string(), json!(dest_ct_id));
        payload.insert("inputs".to_string(), json!({}));
        if org_id != 0 {
            payload.insert("organization".to_string(), json!(org_id));
        }
        match create_resource(dst, &format!("{prefix}credentials/"), &Value::Object(payload)).await
        {
            Ok(id) => {
                ids.creds.insert(name.to_string(), id);
                log(&format!(
                    "  CREATED: {name} (ID {id}) [inputs empty — set secrets manually]"
                ));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 6. Projects
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing projects ===");
    let mut project_wait_list: Vec<(String, i64)> = Vec::new();
    for proj in &data.projects {
        check_cancelled(cancel, log)?;
        let name = proj.name();
        if is_excluded(exclude, "projects", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "projects", name);
        if action != MigrationAction::Create {
            ids.projects.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let org_id = ids.orgs.get(proj.org_name()).copied().unwrap_or(0);

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        payload.insert(
            "description".to_string(),
            json!(proj.str_field_or_empty("description")),
        );
        payload.insert("scm_type".to_string(), json!(proj.str_field_or_empty("scm_type")));
        payload.insert("scm_url".to_string(), json!(proj.str_field_or_empty("scm_url")));
        payload.insert(
            "scm_branch".to_string(),
            json!(proj.str_field_or_empty("scm_branch")),
        );
        for field in [
            "scm_clean",
            "scm_delete_on_update",
            "scm_track_submodules",
            "scm_update_on_launch",
            "scm_update_cache_timeout",
        ] {
            payload.insert(field.to_string(), passthrough(proj, field));
        }
        if org_id != 0 {
            payload.insert("organization".to_string(), json!(org_id));
        }
        let scm_cred_name = proj.scm_credential_name();
        if !scm_cred_name.is_empty() {
            if let Some(&scm_cred_id) = ids.creds.get(scm_cred_name) {
                payload.insert("credential".to_string(), json!(scm_cred_id));
            }
        }

        match create_resource(dst, &format!("{prefix}projects/"), &Value::Object(payload)).await {
            Ok(id) => {
                ids.projects.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
                project_wait_list.push((name.to_string(), id));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // Newly created projects start a source-control sync server-side; on
    // AAP a job template POST referencing an unsynced project is rejected.
    if dst_type == ConnectionType::Aap && !project_wait_list.is_empty() {
        log("  Waiting for project syncs...");
        for (name, id) in &project_wait_list {
            check_cancelled(cancel, log)?;
            match wait_for_project(dst, prefix, *id, PROJECT_SYNC_TIMEOUT, cancel).await {
                Ok(()) => log(&format!("  Project {name} sync complete")),
                Err(e) if e.is_cancelled() => {
                    log("Migration cancelled by user");
                    return Err(e);
                }
                Err(e) => log(&format!("  WARNING: project {name} sync: {e}")),
            }
        }
    }

    // 7. Inventories
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing inventories ===");
    let mut src_inv_names: HashMap<i64, String> = HashMap::new();
    for inv in &data.inventories {
        check_cancelled(cancel, log)?;
        let name = inv.name();
        src_inv_names.insert(inv.id(), name.to_string());
        if is_excluded(exclude, "inventories", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "inventories", name);
        if action != MigrationAction::Create {
            ids.invs.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let org_id = ids.orgs.get(inv.org_name()).copied().unwrap_or(0);
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        payload.insert(
            "description".to_string(),
            json!(inv.str_field_or_empty("description")),
        );
        payload.insert(
            "variables".to_string(),
            json!(inv.str_field_or_empty("variables")),
        );
        if org_id != 0 {
            payload.insert("organization".to_string(), json!(org_id));
        }
        match create_resource(dst, &format!("{prefix}inventories/"), &Value::Object(payload)).await
        {
            Ok(id) => {
                ids.invs.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 8. Hosts per inventory. Lookup-before-create keeps re-runs idempotent.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing hosts ===");
    let mut src_host_names: HashMap<i64, String> = HashMap::new();
    for (src_inv_id, hosts) in &data.hosts {
        let inv_name = src_inv_names.get(src_inv_id).cloned().unwrap_or_default();
        let dest_inv_id = ids.invs.get(&inv_name).copied().unwrap_or(0);
        if is_excluded(exclude, "inventories", &inv_name) {
            log(&format!("  EXCLUDED: {inv_name} (inventory excluded)"));
            for host in hosts {
                src_host_names.insert(host.id(), host.name().to_string());
            }
            continue;
        }
        if dest_inv_id == 0 {
            continue;
        }
        for host in hosts {
            check_cancelled(cancel, log)?;
            let name = host.name();
            src_host_names.insert(host.id(), name.to_string());
            let key = format!("{inv_name}/{name}");
            if is_excluded(exclude, "hosts", name) {
                log(&format!("  EXCLUDED: {inv_name}/{name} (user exclusion)"));
                continue;
            }
            let host_path = format!("{prefix}inventories/{dest_inv_id}/hosts/");
            if let Ok(Some(existing)) = dst.find_by_name(&host_path, name).await {
                ids.hosts.insert(key, existing.id());
                continue;
            }
            let payload = json!({
                "name": name,
                "description": host.str_field_or_empty("description"),
                "variables": host.str_field_or_empty("variables"),
                "enabled": passthrough(host, "enabled"),
            });
            match create_resource(dst, &host_path, &payload).await {
                Ok(id) => {
                    ids.hosts.insert(key, id);
                }
                Err(e) => log(&format!("  FAIL: {inv_name}/{name}: {e}")),
            }
        }
        log(&format!("  {inv_name}: {} hosts", hosts.len()));
    }

    // 9. Groups per inventory, then group-host edges. Re-associating an
    // existing edge answers 4xx, so association results are dropped.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing groups ===");
    for (src_inv_id, groups) in &data.groups {
        let inv_name = src_inv_names.get(src_inv_id).cloned().unwrap_or_default();
        let dest_inv_id = ids.invs.get(&inv_name).copied().unwrap_or(0);
        if dest_inv_id == 0 || is_excluded(exclude, "inventories", &inv_name) {
            continue;
        }
        for group in groups {
            check_cancelled(cancel, log)?;
            let name = group.name();
            let key = format!("{inv_name}/{name}");
            let src_group_id = group.id();

            let group_path = format!("{prefix}inventories/{dest_inv_id}/groups/");
            let dest_group_id = match dst.find_by_name(&group_path, name).await {
                Ok(Some(existing)) => {
                    let id = existing.id();
                    ids.groups.insert(key, id);
                    id
                }
                _ => {
                    let payload = json!({
                        "name": name,
                        "description": group.str_field_or_empty("description"),
                        "variables": group.str_field_or_empty("variables"),
                    });
                    match create_resource(dst, &group_path, &payload).await {
                        Ok(id) => {
                            ids.groups.insert(key, id);
                            id
                        }
                        Err(e) => {
                            log(&format!("  FAIL: {inv_name}/{name}: {e}"));
                            continue;
                        }
                    }
                }
            };

            if let Some(host_ids) = data.group_hosts.get(&src_group_id) {
                for src_host_id in host_ids {
                    let host_name = src_host_names.get(src_host_id).cloned().unwrap_or_default();
                    let host_key = format!("{inv_name}/{host_name}");
                    if let Some(&dest_host_id) = ids.hosts.get(&host_key) {
                        let _ = dst
                            .post(
                                &format!("{prefix}groups/{dest_group_id}/hosts/"),
                                &json!({"id": dest_host_id}),
                            )
                            .await;
                    }
                }
            }
        }
        log(&format!("  {inv_name}: {} groups", groups.len()));
    }

    // 10. Job templates: behavioral flags pass through unchanged.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing job templates ===");
    for jt in &data.job_templates {
        check_cancelled(cancel, log)?;
        let name = jt.name();
        if is_excluded(exclude, "job_templates", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "job_templates", name);
        if action != MigrationAction::Create {
            ids.jts.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        for field in ["description", "job_type", "playbook", "limit", "extra_vars",
            "host_config_key", "scm_branch"]
        {
            payload.insert(field.to_string(), json!(jt.str_field_or_empty(field)));
        }
        for field in [
            "forks",
            "verbosity",
            "ask_variables_on_launch",
            "ask_limit_on_launch",
            "ask_tags_on_launch",
            "ask_diff_mode_on_launch",
            "ask_skip_tags_on_launch",
            "ask_job_type_on_launch",
            "ask_credential_on_launch",
            "ask_verbosity_on_launch",
            "ask_inventory_on_launch",
            "ask_scm_branch_on_launch",
            "ask_execution_environment_on_launch",
            "ask_labels_on_launch",
            "ask_forks_on_launch",
            "ask_job_slice_count_on_launch",
            "ask_timeout_on_launch",
            "survey_enabled",
            "become_enabled",
            "diff_mode",
            "allow_simultaneous",
            "job_slice_count",
            "timeout",
            "use_fact_cache",
        ] {
            payload.insert(field.to_string(), passthrough(jt, field));
        }
        if let Some(&proj_id) = ids.projects.get(jt.project_name()) {
            payload.insert("project".to_string(), json!(proj_id));
        }
        if let Some(&inv_id) = ids.invs.get(jt.inventory_name()) {
            payload.insert("inventory".to_string(), json!(inv_id));
        }

        let id = match create_resource(
            dst,
            &format!("{prefix}job_templates/"),
            &Value::Object(payload),
        )
        .await
        {
            Ok(id) => id,
            Err(e) => {
                log(&format!("  FAIL: {name}: {e}"));
                continue;
            }
        };
        ids.jts.insert(name.to_string(), id);
        log(&format!("  CREATED: {name} (ID {id})"));

        for cred_name in jt.credential_names() {
            if let Some(&cred_id) = ids.creds.get(cred_name) {
                let _ = dst
                    .post(
                        &format!("{prefix}job_templates/{id}/credentials/"),
                        &json!({"id": cred_id}),
                    )
                    .await;
            }
        }

        if let Some(survey) = data.surveys.get(&jt.id()) {
            let _ = dst
                .post(
                    &format!("{prefix}job_templates/{id}/survey_spec/"),
                    &Value::Object(survey.0.clone()),
                )
                .await;
        }
    }

    // 11. Schedules, under the parent's own schedules endpoint.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing schedules ===");
    for sched in &data.schedules {
        check_cancelled(cancel, log)?;
        let name = sched.name();
        if is_excluded(exclude, "schedules", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, _) = action_for(preview, "schedules", name);
        if action != MigrationAction::Create {
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let parent_name = sched.unified_job_template_name();
        let (parent_endpoint, dest_parent_id) = match ids.jts.get(parent_name) {
            Some(&id) => ("job_templates", id),
            None => match ids.wfjts.get(parent_name) {
                Some(&id) => ("workflow_job_templates", id),
                None => {
                    log(&format!("  SKIP: {name} (parent {parent_name:?} not found)"));
                    continue;
                }
            },
        };

        let payload = json!({
            "name": name,
            "rrule": sched.str_field_or_empty("rrule"),
        });
        match create_resource(
            dst,
            &format!("{prefix}{parent_endpoint}/{dest_parent_id}/schedules/"),
            &payload,
        )
        .await
        {
            Ok(_) => log(&format!("  CREATED: {name}")),
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 12. Workflow job templates
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing workflow job templates ===");
    for wf in &data.workflow_jts {
        check_cancelled(cancel, log)?;
        let name = wf.name();
        if is_excluded(exclude, "workflow_job_templates", name) {
            log(&format!("  EXCLUDED: {name} (user exclusion)"));
            continue;
        }
        let (action, dest_id) = action_for(preview, "workflow_job_templates", name);
        if action != MigrationAction::Create {
            ids.wfjts.insert(name.to_string(), dest_id);
            log(&format!("  SKIP (exists): {name}"));
            continue;
        }
        let org_id = ids.orgs.get(wf.org_name()).copied().unwrap_or(0);

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        for field in ["description", "extra_vars", "limit", "scm_branch"] {
            payload.insert(field.to_string(), json!(wf.str_field_or_empty(field)));
        }
        for field in [
            "survey_enabled",
            "allow_simultaneous",
            "ask_variables_on_launch",
            "ask_inventory_on_launch",
            "ask_scm_branch_on_launch",
            "ask_limit_on_launch",
            "ask_labels_on_launch",
        ] {
            payload.insert(field.to_string(), passthrough(wf, field));
        }
        if org_id != 0 {
            payload.insert("organization".to_string(), json!(org_id));
        }
        match create_resource(
            dst,
            &format!("{prefix}workflow_job_templates/"),
            &Value::Object(payload),
        )
        .await
        {
            Ok(id) => {
                ids.wfjts.insert(name.to_string(), id);
                log(&format!("  CREATED: {name} (ID {id})"));
            }
            Err(e) => log(&format!("  FAIL: {name}: {e}")),
        }
    }

    // 13. Workflow nodes, two passes per workflow: create all nodes, then
    // wire the success/failure/always edges between destination node IDs.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing workflow nodes ===");
    for wf in &data.workflow_jts {
        let wf_name = wf.name();
        let src_wf_id = wf.id();
        let dest_wf_id = ids.wfjts.get(wf_name).copied().unwrap_or(0);
        if dest_wf_id == 0 {
            continue;
        }
        let Some(nodes) = data.workflow_nodes.get(&src_wf_id) else {
            continue;
        };
        if nodes.is_empty() {
            continue;
        }

        for node in nodes {
            check_cancelled(cancel, log)?;
            let ujt_name = node.unified_job_template_name();
            let dest_ujt_id = ids
                .jts
                .get(ujt_name)
                .or_else(|| ids.wfjts.get(ujt_name))
                .copied()
                .unwrap_or(0);
            if dest_ujt_id == 0 {
                log(&format!(
                    "  SKIP node: unified_job_template {ujt_name:?} not found"
                ));
                continue;
            }
            match create_resource(
                dst,
                &format!("{prefix}workflow_job_templates/{dest_wf_id}/workflow_nodes/"),
                &json!({"unified_job_template": dest_ujt_id}),
            )
            .await
            {
                Ok(node_id) => {
                    ids.nodes.insert(node.id(), node_id);
                }
                Err(e) => log(&format!("  FAIL node for {ujt_name}: {e}")),
            }
        }

        for node in nodes {
            check_cancelled(cancel, log)?;
            let Some(&dest_node_id) = ids.nodes.get(&node.id()) else {
                continue;
            };
            for edge_kind in ["success_nodes", "failure_nodes", "always_nodes"] {
                wire_edges(dst, prefix, dest_node_id, node, edge_kind, &ids).await;
            }
        }

        log(&format!("  Workflow {wf_name}: {} nodes", nodes.len()));

        if let Some(survey) = data.surveys.get(&src_wf_id) {
            let _ = dst
                .post(
                    &format!("{prefix}workflow_job_templates/{dest_wf_id}/survey_spec/"),
                    &Value::Object(survey.0.clone()),
                )
                .await;
        }
    }

    // 14. Org memberships. Unresolved references are silently skipped.
    check_cancelled(cancel, log)?;
    log("");
    log("=== Importing user-org associations ===");
    for org in &data.organizations {
        let src_org_id = org.id();
        let org_name = org.name();
        let dest_org_id = ids.orgs.get(org_name).copied().unwrap_or(0);
        if dest_org_id == 0 {
            continue;
        }
        let Some(usernames) = data.org_users.get(&src_org_id) else {
            continue;
        };
        for username in usernames {
            check_cancelled(cancel, log)?;
            if let Some(&dest_user_id) = ids.users.get(username) {
                let _ = dst
                    .post(
                        &format!("{prefix}organizations/{dest_org_id}/users/"),
                        &json!({"id": dest_user_id}),
                    )
                    .await;
            }
        }
        if !usernames.is_empty() {
            log(&format!("  {org_name}: {} users", usernames.len()));
        }
    }

    // 15. Team memberships
    log("=== Importing user-team associations ===");
    for team in &data.teams {
        let src_team_id = team.id();
        let team_name = team.name();
        let dest_team_id = ids.teams.get(team_name).copied().unwrap_or(0);
        if dest_team_id == 0 {
            continue;
        }
        let Some(usernames) = data.team_users.get(&src_team_id) else {
            continue;
        };
        for username in usernames {
            check_cancelled(cancel, log)?;
            if let Some(&dest_user_id) = ids.users.get(username) {
                let _ = dst
                    .post(
                        &format!("{prefix}teams/{dest_team_id}/users/"),
                        &json!({"id": dest_user_id}),
                    )
                    .await;
            }
        }
        if !usernames.is_empty() {
            log(&format!("  {team_name}: {} users", usernames.len()));
        }
    }

    log("");
    log("=== Migration complete ===");
    Ok(())
}

/// Connects one node's edges of one kind. Association errors are dropped;
/// re-posting an existing edge returns 4xx but the edge is present.
async fn wire_edges(
    dst: &ApiClient,
    prefix: &str,
    dest_node_id: i64,
    node: &Resource,
    edge_kind: &str,
    ids: &IdMap,
) {
    for src_target_id in node.id_list(edge_kind) {
        if let Some(&dest_target_id) = ids.nodes.get(&src_target_id) {
            let _ = dst
                .post(
                    &format!("{prefix}workflow_job_template_nodes/{dest_node_id}/{edge_kind}/"),
                    &json!({"id": dest_target_id}),
                )
                .await;
        }
    }
}

/// Polls a project until its sync finishes, fails, or the deadline passes.
/// The sleep wakes early on cancellation.
async fn wait_for_project(
    client: &ApiClient,
    prefix: &str,
    id: i64,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), MigrationError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        let proj: Resource = client
            .get_json(&format!("{prefix}projects/{id}/"), &[])
            .await?;
        match proj.str_field_or_empty("status") {
            "successful" => return Ok(()),
            status @ ("failed" | "error" | "canceled") => {
                return Err(MigrationError::ProjectSync(status.to_string()));
            }
            _ => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(MigrationError::ProjectSyncTimeout);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
            _ = tokio::time::sleep(PROJECT_SYNC_POLL) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MigrationResource;

    fn preview_with(type_name: &str, name: &str, action: MigrationAction, dest_id: i64) -> MigrationPreview {
        let mut preview = MigrationPreview::default();
        preview.resources.insert(
            type_name.to_string(),
            vec![MigrationResource {
                source_id: 1,
                name: name.to_string(),
                resource_type: type_name.to_string(),
                action,
                dest_id: if dest_id > 0 { Some(dest_id) } else { None },
            }],
        );
        preview
    }

    #[test]
    fn test_action_for_known_resource() {
        let preview = preview_with("organizations", "Acme", MigrationAction::SkipExists, 12);
        let (action, dest_id) = action_for(&preview, "organizations", "Acme");
        assert_eq!(action, MigrationAction::SkipExists);
        assert_eq!(dest_id, 12);
    }

    #[test]
    fn test_action_for_defaults_to_create() {
        let preview = preview_with("organizations", "Acme", MigrationAction::SkipExists, 12);
        let (action, dest_id) = action_for(&preview, "organizations", "Ghost");
        assert_eq!(action, MigrationAction::Create);
        assert_eq!(dest_id, 0);

        let (action, _) = action_for(&preview, "teams", "Acme");
        assert_eq!(action, MigrationAction::Create);
    }

    #[test]
    fn test_is_excluded() {
        let mut exclude = ExclusionMap::new();
        exclude.insert("job_templates".to_string(), vec!["Deploy".to_string()]);
        assert!(is_excluded(&exclude, "job_templates", "Deploy"));
        assert!(!is_excluded(&exclude, "job_templates", "Audit"));
        assert!(!is_excluded(&exclude, "projects", "Deploy"));
    }

    #[test]
    fn test_check_cancelled() {
        let cancel = CancellationToken::new();
        let lines = std::sync::Mutex::new(Vec::<String>::new());
        let log = |line: &str| lines.lock().unwrap().push(line.to_string());

        assert!(check_cancelled(&cancel, &log).is_ok());
        cancel.cancel();
        let err = check_cancelled(&cancel, &log).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(lines.lock().unwrap().as_slice(), ["Migration cancelled by user"]);
    }
}
