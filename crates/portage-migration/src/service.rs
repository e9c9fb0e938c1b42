//! The two entry points of the engine: `preview` (export + preflight) and
//! `run` (import), both synchronous within their job.

use portage_core::Connection;
use portage_platform::ApiClient;
use tokio_util::sync::CancellationToken;

use crate::data::{ExclusionMap, ExportedData, MigrationPreview};
use crate::error::MigrationError;
use crate::export::export_all;
use crate::import::import_all;
use crate::preflight::preflight_check;

/// Log sink for user-visible migration progress. One event per line; the
/// line vocabulary is part of the observable contract.
pub type Logger<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// The API prefix to use for a connection: the discovered one when
/// available, the flavor default otherwise.
fn api_prefix(conn: &Connection) -> String {
    if !conn.api_prefix.is_empty() {
        conn.api_prefix.clone()
    } else {
        conn.conn_type.api_prefix().to_string()
    }
}

/// Exports all resources from the source and checks the destination for
/// conflicts. Returns the preview (for the UI) and the exported graph (for
/// the import step).
pub async fn preview(
    src: &Connection,
    dst: &Connection,
    log: Logger<'_>,
) -> Result<(MigrationPreview, ExportedData), MigrationError> {
    let src_client = ApiClient::new(src).map_err(MigrationError::Source)?;
    let dst_client = ApiClient::new(dst).map_err(MigrationError::Destination)?;
    let src_prefix = api_prefix(src);
    let dst_prefix = api_prefix(dst);

    log("Checking source connectivity...");
    src_client
        .get(&format!("{src_prefix}organizations/"), &[])
        .await
        .map_err(MigrationError::Source)?;
    log(&format!("Source OK: {}", src.name));

    log("Checking destination connectivity...");
    dst_client
        .get(&format!("{dst_prefix}organizations/"), &[])
        .await
        .map_err(MigrationError::Destination)?;
    log(&format!("Destination OK: {}", dst.name));

    log("");
    log("=== Exporting from source ===");
    let data = export_all(&src_client, &src_prefix, log).await?;

    log("");
    log("=== Checking destination ===");
    let mut preview = preflight_check(&data, &dst_client, &dst_prefix, log).await?;
    preview.source_id = src.id.clone();
    preview.destination_id = dst.id.clone();

    let (create_count, skip_count) = preview.totals();
    log("");
    log(&format!(
        "Preview complete: {create_count} to create, {skip_count} to skip"
    ));

    Ok((preview, data))
}

/// Imports previously exported data into the destination, honoring the
/// preview's actions and the user's exclusion map.
pub async fn run(
    dst: &Connection,
    data: &ExportedData,
    preview: &MigrationPreview,
    exclude: &ExclusionMap,
    cancel: &CancellationToken,
    log: Logger<'_>,
) -> Result<(), MigrationError> {
    let dst_client = ApiClient::new(dst).map_err(MigrationError::Destination)?;
    let dst_prefix = api_prefix(dst);

    log(&format!("=== Starting migration to {} ===", dst.name));
    log("");

    import_all(
        &dst_client,
        &dst_prefix,
        dst.conn_type,
        data,
        preview,
        exclude,
        cancel,
        log,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_core::ConnectionType;

    #[test]
    fn test_api_prefix_prefers_discovered() {
        let mut conn = Connection {
            conn_type: ConnectionType::Aap,
            ..Default::default()
        };
        assert_eq!(api_prefix(&conn), "/api/controller/v2/");
        conn.api_prefix = "/api/gateway/v2/".to_string();
        assert_eq!(api_prefix(&conn), "/api/gateway/v2/");
    }
}
