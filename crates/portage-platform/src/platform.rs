//! Operations available on an automation platform, per dialect.

use async_trait::async_trait;
use portage_core::{Connection, ConnectionType, Resource, ResourceType};

use crate::client::ApiClient;
use crate::discovery::{ping_paths, rewrite_paths, version_at_least};
use crate::error::PlatformError;
use crate::registry::{aap_resources, awx_resources};

/// Read-side operations on an AWX or AAP instance.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Tests connectivity. Ok if any known ping endpoint answers.
    async fn ping(&self) -> Result<(), PlatformError>;

    /// Verifies credentials against an authenticated endpoint.
    async fn check_auth(&self) -> Result<(), PlatformError>;

    /// Browsable resource types, gated on the detected platform version.
    fn resource_types(&self) -> Vec<ResourceType>;

    /// All objects of a given resource type.
    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Resource>, PlatformError>;
}

/// Creates the Platform implementation for a connection. If discovery found
/// an API prefix differing from the flavor default, registry paths are
/// rewritten. No HTTP calls are made here.
pub fn new_platform(conn: &Connection) -> Result<Box<dyn Platform>, PlatformError> {
    let client = ApiClient::new(conn)?;
    let default_prefix = conn.conn_type.api_prefix();
    let mut resources = match conn.conn_type {
        ConnectionType::Awx => awx_resources(),
        ConnectionType::Aap => aap_resources(),
    };
    if !conn.api_prefix.is_empty() && conn.api_prefix != default_prefix {
        resources = rewrite_paths(&resources, default_prefix, &conn.api_prefix);
    }
    Ok(Box::new(FlavorPlatform {
        client,
        conn_type: conn.conn_type,
        resources,
        version: conn.version.clone(),
    }))
}

struct FlavorPlatform {
    client: ApiClient,
    conn_type: ConnectionType,
    resources: Vec<ResourceType>,
    version: String,
}

#[async_trait]
impl Platform for FlavorPlatform {
    async fn ping(&self) -> Result<(), PlatformError> {
        let mut last_err = None;
        for path in ping_paths(self.conn_type) {
            match self.client.ping(path).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.expect("ping_paths is never empty"))
    }

    async fn check_auth(&self) -> Result<(), PlatformError> {
        let probe = format!("{}organizations/", self.conn_type.api_prefix());
        match self.client.get(&probe, &[("page_size", "1")]).await {
            Ok(_) => Ok(()),
            // AAP 2.4 RPM installs answer on the non-gateway path only
            Err(e) if self.conn_type == ConnectionType::Aap => {
                match self
                    .client
                    .get("/api/v2/organizations/", &[("page_size", "1")])
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(_) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn resource_types(&self) -> Vec<ResourceType> {
        if self.version.is_empty() {
            return self.resources.clone();
        }
        self.resources
            .iter()
            .filter(|r| version_at_least(&self.version, &r.min_version))
            .cloned()
            .collect()
    }

    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Resource>, PlatformError> {
        let rt = self
            .resource_types()
            .into_iter()
            .find(|r| r.name == resource_type)
            .ok_or_else(|| PlatformError::UnknownResourceType(resource_type.to_string()))?;
        self.client.get_all(&rt.api_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection_for(server: &MockServer, conn_type: ConnectionType) -> Connection {
        let url = url::Url::parse(&server.uri()).unwrap();
        Connection {
            conn_type,
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap().to_string(),
            port: url.port().unwrap(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_aap_ping_falls_back_to_non_gateway_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/controller/v2/ping/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.4.0"})))
            .mount(&server)
            .await;

        let platform = new_platform(&connection_for(&server, ConnectionType::Aap)).unwrap();
        platform.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_auth_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail":"nope"}"#))
            .mount(&server)
            .await;

        let platform = new_platform(&connection_for(&server, ConnectionType::Awx)).unwrap();
        assert!(platform.check_auth().await.is_err());
    }

    #[tokio::test]
    async fn test_list_resources_unknown_type() {
        let server = MockServer::start().await;
        let platform = new_platform(&connection_for(&server, ConnectionType::Awx)).unwrap();
        let err = platform.list_resources("widgets").await.unwrap_err();
        assert!(matches!(err, PlatformError::UnknownResourceType(_)));
    }

    #[tokio::test]
    async fn test_list_resources_fetches_registry_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "next": null, "results": [{"id": 1, "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        let platform = new_platform(&connection_for(&server, ConnectionType::Awx)).unwrap();
        let orgs = platform.list_resources("organizations").await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].name(), "Acme");
    }

    #[tokio::test]
    async fn test_detected_prefix_rewrites_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/organizations/"))
            .and(query_param("page_size", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0, "next": null, "results": []
            })))
            .mount(&server)
            .await;

        let mut conn = connection_for(&server, ConnectionType::Aap);
        conn.api_prefix = "/api/gateway/v2/".to_string();
        let platform = new_platform(&conn).unwrap();
        let types = platform.resource_types();
        assert!(types.iter().all(|r| r.api_path.starts_with("/api/gateway/v2/")));
    }
}
