//! Read-only destination check: classify every exported item as `create`
//! or `skip_exists`.

use portage_platform::ApiClient;

use crate::data::{ExportedData, MigrationAction, MigrationPreview, MigrationResource};
use crate::error::MigrationError;
use crate::service::Logger;

/// Resource types in the order they appear in the preview.
pub const PREVIEW_ORDER: &[&str] = &[
    "organizations",
    "teams",
    "users",
    "credential_types",
    "credentials",
    "projects",
    "inventories",
    "job_templates",
    "workflow_job_templates",
    "schedules",
];

pub const CREDENTIAL_SECRETS_WARNING: &str = "Credential secrets cannot be exported via API. \
    Credentials will be created with empty inputs — you must set secrets manually after migration.";

pub const USER_PASSWORDS_WARNING: &str = "User passwords cannot be exported. Users will be \
    created with a placeholder password (changeme!) and must be reset.";

/// Looks up every exported item on the destination by natural key and
/// classifies the planned action. Lookup transport failures abort the
/// phase; preflight never writes.
pub async fn preflight_check(
    data: &ExportedData,
    dst: &ApiClient,
    prefix: &str,
    log: Logger<'_>,
) -> Result<MigrationPreview, MigrationError> {
    let mut preview = MigrationPreview::default();

    for &type_name in PREVIEW_ORDER {
        let items = data.for_type(type_name);
        if items.is_empty() {
            continue;
        }

        log(&format!("Checking {type_name} on destination..."));
        let path = format!("{prefix}{type_name}/");
        for item in items {
            let name = item.name();
            let existing = match type_name {
                "users" => dst.find_by_username(&path, name).await,
                _ => dst.find_by_name(&path, name).await,
            }
            .map_err(MigrationError::Preflight)?;

            let mut resource = MigrationResource {
                source_id: item.id(),
                name: name.to_string(),
                resource_type: type_name.to_string(),
                action: MigrationAction::Create,
                dest_id: None,
            };
            if let Some(existing) = existing {
                resource.action = MigrationAction::SkipExists;
                resource.dest_id = Some(existing.id());
                log(&format!("  {name}: exists (dest ID {})", existing.id()));
            }
            preview
                .resources
                .entry(type_name.to_string())
                .or_default()
                .push(resource);
        }
    }

    if !data.credentials.is_empty() {
        preview.warnings.push(CREDENTIAL_SECRETS_WARNING.to_string());
    }
    if !data.users.is_empty() {
        preview.warnings.push(USER_PASSWORDS_WARNING.to_string());
    }

    Ok(preview)
}
