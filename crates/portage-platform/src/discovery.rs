//! One-shot API discovery: learn the version prefix from `/api/` and the
//! platform version from `ping/`, so resource paths can be rewritten per
//! connection. All discovery is best-effort; failures never abort anything.

use std::cmp::Ordering;
use std::collections::HashMap;

use portage_core::{ConnectionType, ResourceType};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::PlatformError;

/// The parsed `ping/` response.
#[derive(Debug, Default, Deserialize)]
pub struct PingResponse {
    #[serde(default)]
    pub version: String,
}

/// One service entry under `apis` in the AAP `/api/` response. Gateway
/// builds return `{"prefix": "/api/controller/"}`; some older ones return
/// the prefix string directly.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiRootService {
    Entry { prefix: String },
    Prefix(String),
}

impl ApiRootService {
    pub fn prefix(&self) -> &str {
        match self {
            ApiRootService::Entry { prefix } => prefix,
            ApiRootService::Prefix(prefix) => prefix,
        }
    }
}

/// The parsed `/api/` response.
/// AWX: `{"current_version": "/api/v2/", ...}`
/// AAP: `{"apis": {"controller": {"prefix": "/api/controller/"}, ...}}`
#[derive(Debug, Default, Deserialize)]
pub struct ApiRootResponse {
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub apis: HashMap<String, ApiRootService>,
}

/// Extracts the version from a `ping/` response body. Errors when the body
/// is not JSON or carries no version.
pub fn parse_ping_response(body: &str) -> Result<PingResponse, PlatformError> {
    let resp: PingResponse = serde_json::from_str(body).map_err(|e| PlatformError::Parse {
        path: "ping/".to_string(),
        detail: e.to_string(),
    })?;
    if resp.version.is_empty() {
        return Err(PlatformError::Parse {
            path: "ping/".to_string(),
            detail: "ping response missing version field".to_string(),
        });
    }
    Ok(resp)
}

/// Parses the `/api/` response body.
pub fn parse_api_root(body: &str) -> Result<ApiRootResponse, PlatformError> {
    serde_json::from_str(body).map_err(|e| PlatformError::Parse {
        path: "/api/".to_string(),
        detail: e.to_string(),
    })
}

/// Determines the API prefix from the parsed `/api/` response.
/// AWX: `current_version` as-is. AAP: `apis.controller` prefix + `v2/`.
/// Empty string when detection fails.
pub fn detect_api_prefix(root: &ApiRootResponse) -> String {
    if !root.current_version.is_empty() {
        return with_trailing_slash(&root.current_version);
    }
    if let Some(controller) = root.apis.get("controller") {
        let prefix = controller.prefix();
        if !prefix.is_empty() {
            return format!("{}v2/", with_trailing_slash(prefix));
        }
    }
    String::new()
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

/// Numeric part-by-part version comparison; missing parts count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts = parse_version_parts(a);
    let b_parts = parse_version_parts(b);
    let len = a_parts.len().max(b_parts.len());
    for i in 0..len {
        let av = a_parts.get(i).copied().unwrap_or(0);
        let bv = b_parts.get(i).copied().unwrap_or(0);
        match av.cmp(&bv) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// `true` iff `version >= min`, with the empty string compatible with
/// everything on either side.
pub fn version_at_least(version: &str, min: &str) -> bool {
    if version.is_empty() || min.is_empty() {
        return true;
    }
    compare_versions(version, min) != Ordering::Less
}

fn parse_version_parts(v: &str) -> Vec<u64> {
    v.split('.')
        .map_while(|p| p.parse::<u64>().ok())
        .collect()
}

/// The primary ping endpoint for a connection type.
pub fn ping_path(conn_type: ConnectionType) -> &'static str {
    ping_paths(conn_type)[0]
}

/// Ping endpoints to try, in order. AAP tries the gateway path first, then
/// falls back to the non-gateway path (AAP 2.4 RPM has no gateway).
pub fn ping_paths(conn_type: ConnectionType) -> &'static [&'static str] {
    match conn_type {
        ConnectionType::Aap => &["/api/controller/v2/ping/", "/api/v2/ping/"],
        ConnectionType::Awx => &["/api/v2/ping/"],
    }
}

/// Returns a copy of the registry with API paths rewritten from `old_prefix`
/// to `new_prefix`. The originals (and their skip sets) are left untouched.
pub fn rewrite_paths(
    resources: &[ResourceType],
    old_prefix: &str,
    new_prefix: &str,
) -> Vec<ResourceType> {
    resources
        .iter()
        .map(|r| {
            let mut rewritten = r.clone();
            rewritten.api_path = r.api_path.replacen(old_prefix, new_prefix, 1);
            rewritten
        })
        .collect()
}

/// Calls a ping endpoint and parses the version. An HTTP success with an
/// unparseable body yields an empty version, not an error.
pub async fn ping_with_version(
    client: &ApiClient,
    api_path: &str,
) -> Result<PingResponse, PlatformError> {
    let body = client.get(api_path, &[]).await?;
    match parse_ping_response(&body) {
        Ok(resp) => Ok(resp),
        Err(_) => Ok(PingResponse::default()),
    }
}

/// Probes `/api/` and returns the detected API prefix, or `None` when
/// anything along the way fails. Failures are logged, never raised.
pub async fn discover_api_prefix(client: &ApiClient) -> Option<String> {
    let body = match client.get("/api/", &[]).await {
        Ok(body) => body,
        Err(e) => {
            warn!("discovery: /api/ failed: {e}");
            return None;
        }
    };
    let root = match parse_api_root(&body) {
        Ok(root) => root,
        Err(e) => {
            warn!("discovery: parse /api/ failed: {e}");
            return None;
        }
    };
    let prefix = detect_api_prefix(&root);
    if prefix.is_empty() {
        warn!("discovery: could not detect API prefix");
        return None;
    }
    debug!("discovery: detected API prefix {prefix}");
    Some(prefix)
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_ping_with_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": "23.4.0", "ha": false, "active_node": "awx-1"
            })))
            .mount(&server)
            .await;

        let client = ApiClient::with_credentials(server.uri(), "admin", "secret").unwrap();
        let resp = ping_with_version(&client, "/api/v2/ping/").await.unwrap();
        assert_eq!(resp.version, "23.4.0");
    }

    #[tokio::test]
    async fn test_ping_with_version_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .mount(&server)
            .await;

        let client = ApiClient::with_credentials(server.uri(), "admin", "secret").unwrap();
        let resp = ping_with_version(&client, "/api/v2/ping/").await.unwrap();
        assert_eq!(resp.version, "");
    }

    #[tokio::test]
    async fn test_discover_api_prefix_aap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "apis": {"controller": {"prefix": "/api/controller/"}}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::with_credentials(server.uri(), "admin", "secret").unwrap();
        let prefix = discover_api_prefix(&client).await;
        assert_eq!(prefix.as_deref(), Some("/api/controller/v2/"));
    }

    #[tokio::test]
    async fn test_discover_api_prefix_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::with_credentials(server.uri(), "admin", "secret").unwrap();
        assert!(discover_api_prefix(&client).await.is_none());
    }
}
