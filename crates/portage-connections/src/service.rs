//! Connection health checks and discovery orchestration.

use portage_core::{Connection, ConnectionStore, HealthStatus};
use portage_platform::{discovery, ApiClient, PlatformError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Pings the connection, verifies credentials, then runs API discovery.
/// Health and discovered version/prefix are persisted on the store; the
/// refreshed connection is returned. Discovery failures never fail the
/// check — the engine falls back to default paths.
pub async fn refresh_connection_health(
    store: &ConnectionStore,
    id: &str,
) -> Result<Connection, ConnectionError> {
    let conn = store
        .get(id)
        .ok_or_else(|| ConnectionError::NotFound(id.to_string()))?;
    let platform = portage_platform::new_platform(&conn)?;

    let mut ping_status = HealthStatus::Ok;
    let mut ping_error = String::new();
    if let Err(e) = platform.ping().await {
        ping_status = HealthStatus::Error;
        ping_error = e.to_string();
        warn!("ping failed for {}: {e}", conn.name);
    } else {
        info!("ping ok for {}", conn.name);
    }

    let mut auth_status = HealthStatus::Unknown;
    let mut auth_error = String::new();
    if ping_status == HealthStatus::Ok {
        if conn.username.is_empty() || conn.password.is_empty() {
            auth_status = HealthStatus::Error;
            auth_error = "no credentials configured".to_string();
        } else if let Err(e) = platform.check_auth().await {
            auth_status = HealthStatus::Error;
            auth_error = e.to_string();
            warn!("auth failed for {}: {e}", conn.name);
        } else {
            auth_status = HealthStatus::Ok;
            info!("auth ok for {}", conn.name);
            run_discovery(store, &conn).await;
        }
    }

    store.set_health(id, ping_status, &ping_error, auth_status, &auth_error);
    Ok(store.get(id).expect("connection vanished during health check"))
}

/// Detects the platform version and API prefix. Only called after auth
/// succeeds; all failures are logged and swallowed.
async fn run_discovery(store: &ConnectionStore, conn: &Connection) {
    let client = match ApiClient::new(conn) {
        Ok(client) => client,
        Err(e) => {
            warn!("discovery client for {}: {e}", conn.name);
            return;
        }
    };

    // Try each ping endpoint in order; AAP 2.4 RPM installs have no
    // gateway and only answer on the non-gateway path.
    let mut version = String::new();
    for ping_path in discovery::ping_paths(conn.conn_type) {
        match discovery::ping_with_version(&client, ping_path).await {
            Ok(resp) if !resp.version.is_empty() => {
                version = resp.version;
                break;
            }
            Ok(_) => {}
            Err(e) => warn!("version probe for {} at {ping_path}: {e}", conn.name),
        }
    }
    if !version.is_empty() {
        info!("{}: detected version {version}", conn.name);
        store.set_version(&conn.id, &version, "");
    }

    if let Some(prefix) = discovery::discover_api_prefix(&client).await {
        info!("{}: detected API prefix {prefix}", conn.name);
        store.set_version(&conn.id, "", &prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_core::ConnectionType;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection_for(server: &MockServer) -> Connection {
        let url = url::Url::parse(&server.uri()).unwrap();
        Connection {
            name: "lab-awx".to_string(),
            conn_type: ConnectionType::Awx,
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap().to_string(),
            port: url.port().unwrap(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_healthy_connection_discovers_version_and_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "23.4.0"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0, "next": null, "results": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_version": "/api/v2/"
            })))
            .mount(&server)
            .await;

        let store = ConnectionStore::new();
        let conn = store.create(connection_for(&server));
        let refreshed = refresh_connection_health(&store, &conn.id).await.unwrap();

        assert_eq!(refreshed.ping_status, HealthStatus::Ok);
        assert_eq!(refreshed.auth_status, HealthStatus::Ok);
        assert_eq!(refreshed.version, "23.4.0");
        assert_eq!(refreshed.api_prefix, "/api/v2/");
        assert!(refreshed.last_checked.is_some());
    }

    #[tokio::test]
    async fn test_aap_without_gateway_falls_back_for_version() {
        let server = MockServer::start().await;
        // No gateway: the controller-prefixed endpoints answer 404.
        Mock::given(method("GET"))
            .and(path("/api/controller/v2/ping/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/controller/v2/organizations/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.4.0"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0, "next": null, "results": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_version": "/api/v2/"
            })))
            .mount(&server)
            .await;

        let store = ConnectionStore::new();
        let mut conn = connection_for(&server);
        conn.conn_type = ConnectionType::Aap;
        let conn = store.create(conn);
        let refreshed = refresh_connection_health(&store, &conn.id).await.unwrap();

        assert_eq!(refreshed.ping_status, HealthStatus::Ok);
        assert_eq!(refreshed.auth_status, HealthStatus::Ok);
        assert_eq!(refreshed.version, "4.4.0");
        assert_eq!(refreshed.api_prefix, "/api/v2/");
    }

    #[tokio::test]
    async fn test_unreachable_host_reports_ping_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = ConnectionStore::new();
        let conn = store.create(connection_for(&server));
        let refreshed = refresh_connection_health(&store, &conn.id).await.unwrap();

        assert_eq!(refreshed.ping_status, HealthStatus::Error);
        assert_eq!(refreshed.auth_status, HealthStatus::Unknown);
        assert!(!refreshed.ping_error.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "23.4.0"})))
            .mount(&server)
            .await;

        let store = ConnectionStore::new();
        let mut conn = connection_for(&server);
        conn.username.clear();
        conn.password.clear();
        let conn = store.create(conn);
        let refreshed = refresh_connection_health(&store, &conn.id).await.unwrap();

        assert_eq!(refreshed.ping_status, HealthStatus::Ok);
        assert_eq!(refreshed.auth_status, HealthStatus::Error);
        assert_eq!(refreshed.auth_error, "no credentials configured");
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let store = ConnectionStore::new();
        let err = refresh_connection_health(&store, "ghost").await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotFound(_)));
    }
}
