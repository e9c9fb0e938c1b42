//! Connections to remote automation control planes.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Which API dialect the remote speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Awx,
    Aap,
}

impl ConnectionType {
    /// The default API path prefix for this dialect.
    pub fn api_prefix(&self) -> &'static str {
        match self {
            ConnectionType::Awx => "/api/v2/",
            ConnectionType::Aap => "/api/controller/v2/",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Awx => write!(f, "awx"),
            ConnectionType::Aap => write!(f, "aap"),
        }
    }
}

/// Health probe outcome, tracked separately for ping and auth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Error,
}

/// A user-configured AWX or AAP instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Connection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub conn_type: ConnectionType,
    /// "source" or "destination" (display-only hint for the UI).
    pub role: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Optional CA bundle (PEM) to trust instead of the system roots.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_cert: String,
    /// Skip TLS verification entirely.
    #[serde(default)]
    pub insecure: bool,
    /// Detected platform version, e.g. "23.4.0" or "4.7.8".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Detected API prefix, e.g. "/api/v2/" or "/api/controller/v2/".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_prefix: String,
    #[serde(default)]
    pub ping_status: HealthStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ping_error: String,
    #[serde(default)]
    pub auth_status: HealthStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Connection {
    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// A mask if a password is set, empty string otherwise.
    pub fn masked_password(&self) -> String {
        if self.password.is_empty() {
            String::new()
        } else {
            "••••••••".to_string()
        }
    }
}

/// In-memory thread-safe store for connections.
#[derive(Default)]
pub struct ConnectionStore {
    conns: RwLock<HashMap<String, Connection>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new connection, assigning it a UUID and resetting health.
    pub fn create(&self, mut conn: Connection) -> Connection {
        conn.id = Uuid::new_v4().to_string();
        conn.ping_status = HealthStatus::Unknown;
        conn.auth_status = HealthStatus::Unknown;
        let mut conns = self.conns.write().unwrap();
        conns.insert(conn.id.clone(), conn.clone());
        conn
    }

    pub fn get(&self, id: &str) -> Option<Connection> {
        self.conns.read().unwrap().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Connection> {
        self.conns.read().unwrap().values().cloned().collect()
    }

    /// Replaces an existing connection's settings. Returns false if absent.
    pub fn update(&self, conn: Connection) -> bool {
        let mut conns = self.conns.write().unwrap();
        if !conns.contains_key(&conn.id) {
            return false;
        }
        conns.insert(conn.id.clone(), conn);
        true
    }

    pub fn delete(&self, id: &str) -> bool {
        self.conns.write().unwrap().remove(id).is_some()
    }

    /// Updates the health fields and stamps `last_checked`.
    pub fn set_health(
        &self,
        id: &str,
        ping_status: HealthStatus,
        ping_error: &str,
        auth_status: HealthStatus,
        auth_error: &str,
    ) {
        let mut conns = self.conns.write().unwrap();
        if let Some(conn) = conns.get_mut(id) {
            conn.ping_status = ping_status;
            conn.ping_error = ping_error.to_string();
            conn.auth_status = auth_status;
            conn.auth_error = auth_error.to_string();
            conn.last_checked = Some(Utc::now());
        }
    }

    /// Stores the discovered platform version and API prefix.
    pub fn set_version(&self, id: &str, version: &str, api_prefix: &str) {
        let mut conns = self.conns.write().unwrap();
        if let Some(conn) = conns.get_mut(id) {
            if !version.is_empty() {
                conn.version = version.to_string();
            }
            if !api_prefix.is_empty() {
                conn.api_prefix = api_prefix.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let cases = [
            ("https", "aap.lab.local", 443, "https://aap.lab.local:443"),
            ("http", "awx.lab.local", 32000, "http://awx.lab.local:32000"),
            ("http", "localhost", 80, "http://localhost:80"),
        ];
        for (scheme, host, port, expect) in cases {
            let conn = Connection {
                scheme: scheme.to_string(),
                host: host.to_string(),
                port,
                ..Default::default()
            };
            assert_eq!(conn.base_url(), expect);
        }
    }

    #[test]
    fn test_masked_password() {
        let mut conn = Connection {
            password: "secret123".to_string(),
            ..Default::default()
        };
        assert_eq!(conn.masked_password(), "••••••••");
        conn.password.clear();
        assert_eq!(conn.masked_password(), "");
    }

    #[test]
    fn test_store_crud() {
        let store = ConnectionStore::new();

        let conn = store.create(Connection {
            name: "test-awx".to_string(),
            host: "localhost".to_string(),
            ..Default::default()
        });
        assert!(!conn.id.is_empty());
        assert_eq!(conn.ping_status, HealthStatus::Unknown);
        assert_eq!(conn.auth_status, HealthStatus::Unknown);

        let got = store.get(&conn.id).expect("created connection not found");
        assert_eq!(got.name, "test-awx");
        assert!(store.get("nonexistent").is_none());

        assert_eq!(store.list().len(), 1);

        let mut updated = got.clone();
        updated.name = "updated".to_string();
        assert!(store.update(updated));
        assert_eq!(store.get(&conn.id).unwrap().name, "updated");

        let missing = Connection {
            id: "missing".to_string(),
            ..Default::default()
        };
        assert!(!store.update(missing));

        assert!(store.delete(&conn.id));
        assert!(store.get(&conn.id).is_none());
        assert!(!store.delete("missing"));
    }

    #[test]
    fn test_store_set_health() {
        let store = ConnectionStore::new();
        let conn = store.create(Connection::default());

        store.set_health(&conn.id, HealthStatus::Ok, "", HealthStatus::Ok, "");
        let got = store.get(&conn.id).unwrap();
        assert_eq!(got.ping_status, HealthStatus::Ok);
        assert_eq!(got.auth_status, HealthStatus::Ok);
        assert!(got.last_checked.is_some());

        store.set_health(
            &conn.id,
            HealthStatus::Ok,
            "",
            HealthStatus::Error,
            "bad credentials",
        );
        let got = store.get(&conn.id).unwrap();
        assert_eq!(got.auth_status, HealthStatus::Error);
        assert_eq!(got.auth_error, "bad credentials");

        // missing ID must not panic
        store.set_health("nonexistent", HealthStatus::Ok, "", HealthStatus::Ok, "");
    }

    #[test]
    fn test_store_set_version() {
        let store = ConnectionStore::new();
        let conn = store.create(Connection::default());

        store.set_version(&conn.id, "23.4.0", "");
        store.set_version(&conn.id, "", "/api/v2/");
        let got = store.get(&conn.id).unwrap();
        assert_eq!(got.version, "23.4.0");
        assert_eq!(got.api_prefix, "/api/v2/");
    }

    #[test]
    fn test_store_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ConnectionStore::new());
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    store.create(Connection {
                        name: "concurrent".to_string(),
                        ..Default::default()
                    })
                })
            })
            .collect();
        let created: Vec<Connection> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.list().len(), 50);

        let handles: Vec<_> = created
            .into_iter()
            .map(|c| {
                let store = store.clone();
                thread::spawn(move || {
                    store.get(&c.id);
                    store.set_health(&c.id, HealthStatus::Ok, "", HealthStatus::Ok, "");
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
