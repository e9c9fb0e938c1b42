//! Server configuration: listen address plus pre-seeded connections, read
//! from a YAML file. CLI flags overlay file values.

use std::path::Path;

use portage_core::{Connection, ConnectionType};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A pre-configured connection in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSeed {
    pub name: String,
    #[serde(rename = "type", default)]
    pub conn_type: ConnectionType,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub scheme: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default)]
    pub insecure: bool,
}

impl ConnectionSeed {
    /// Fills the defaulting rules: role from type (awx → source, aap →
    /// destination), scheme from type (aap → https), port from scheme.
    pub fn into_connection(self) -> Connection {
        let role = if self.role.is_empty() {
            match self.conn_type {
                ConnectionType::Awx => "source".to_string(),
                ConnectionType::Aap => "destination".to_string(),
            }
        } else {
            self.role
        };
        let scheme = if self.scheme.is_empty() {
            match self.conn_type {
                ConnectionType::Aap => "https".to_string(),
                ConnectionType::Awx => "http".to_string(),
            }
        } else {
            self.scheme
        };
        let port = if self.port == 0 {
            if scheme == "https" {
                443
            } else {
                80
            }
        } else {
            self.port
        };
        Connection {
            name: self.name,
            conn_type: self.conn_type,
            role,
            scheme,
            host: self.host,
            port,
            username: self.username,
            password: self.password,
            ca_cert: self.ca_cert,
            insecure: self.insecure,
            ..Default::default()
        }
    }
}

/// All server configuration (CLI flags + config file).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen: String,
    #[serde(default)]
    pub connections: Vec<ConnectionSeed>,
}

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

impl ServerConfig {
    /// Reads a YAML config file and overlays it with CLI values. A non-empty
    /// CLI listen address wins over the file.
    pub fn load(path: &Path, cli_listen: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config: ServerConfig =
            serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        config.apply_cli(cli_listen);
        Ok(config)
    }

    /// Configuration without a file, from CLI values alone.
    pub fn from_cli(cli_listen: &str) -> Self {
        let mut config = ServerConfig::default();
        config.apply_cli(cli_listen);
        config
    }

    fn apply_cli(&mut self, cli_listen: &str) {
        if !cli_listen.is_empty() {
            self.listen = cli_listen.to_string();
        }
        if self.listen.is_empty() {
            self.listen = DEFAULT_LISTEN.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: "0.0.0.0:9000"
connections:
  - name: lab-awx
    type: awx
    scheme: http
    host: awx.lab.local
    port: 32000
    username: admin
    password: secret
  - name: lab-aap
    type: aap
    host: aap.lab.local
    username: admin
    password: secret
    insecure: true
"#;
        let mut config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        config.apply_cli("");
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.connections.len(), 2);

        let awx = config.connections[0].clone().into_connection();
        assert_eq!(awx.conn_type, ConnectionType::Awx);
        assert_eq!(awx.role, "source");
        assert_eq!(awx.port, 32000);
        assert_eq!(awx.base_url(), "http://awx.lab.local:32000");

        let aap = config.connections[1].clone().into_connection();
        assert_eq!(aap.role, "destination");
        assert_eq!(aap.scheme, "https");
        assert_eq!(aap.port, 443);
        assert!(aap.insecure);
    }

    #[test]
    fn test_cli_listen_wins_over_file() {
        let yaml = "listen: \"0.0.0.0:9000\"\n";
        let mut config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        config.apply_cli("127.0.0.1:7777");
        assert_eq!(config.listen, "127.0.0.1:7777");
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::from_cli("");
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_explicit_role_kept() {
        let seed = ConnectionSeed {
            name: "dest-awx".to_string(),
            conn_type: ConnectionType::Awx,
            role: "destination".to_string(),
            host: "awx2.lab.local".to_string(),
            ..Default::default()
        };
        let conn = seed.into_connection();
        assert_eq!(conn.role, "destination");
        assert_eq!(conn.port, 80);
    }
}
