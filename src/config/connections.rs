use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_RAW_CONN_ID: &str = "github_raw";
pub const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";
pub const CONNECTION_STRING_KEY: &str = "connection_string";

/// A named connection record, the way a scheduler's connection store keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default = "default_conn_type")]
    pub conn_type: String,
    pub host: Option<String>,
    /// Verify TLS certificates. The raw-file host has historically been fetched without.
    #[serde(default = "default_verify")]
    pub verify: bool,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

fn default_conn_type() -> String {
    "http".to_string()
}

fn default_verify() -> bool {
    true
}

impl Connection {
    pub fn http(host: impl Into<String>) -> Self {
        Self {
            conn_type: default_conn_type(),
            host: Some(host.into()),
            verify: true,
            timeout_seconds: None,
            extra: HashMap::new(),
        }
    }

    pub fn blob(connection_string: Option<&str>) -> Self {
        let mut extra = HashMap::new();
        if let Some(value) = connection_string {
            extra.insert(CONNECTION_STRING_KEY.to_string(), value.to_string());
        }
        Self {
            conn_type: "blob".to_string(),
            host: None,
            verify: true,
            timeout_seconds: None,
            extra,
        }
    }

    /// The opaque object-store credential, if one is configured.
    ///
    /// A `${VAR}` placeholder left unresolved by environment substitution counts as absent.
    pub fn connection_string(&self) -> Option<&str> {
        self.extra
            .get(CONNECTION_STRING_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && !s.starts_with("${"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.ensure_defaults();
        registry
    }

    /// Adds the public raw-file connection unless one is configured.
    pub fn ensure_defaults(&mut self) {
        self.connections
            .entry(DEFAULT_RAW_CONN_ID.to_string())
            .or_insert_with(|| Connection::http(DEFAULT_RAW_HOST));
    }

    pub fn insert(&mut self, conn_id: impl Into<String>, connection: Connection) {
        self.connections.insert(conn_id.into(), connection);
    }

    pub fn get(&self, conn_id: &str) -> Result<&Connection> {
        self.connections
            .get(conn_id)
            .ok_or_else(|| EtlError::MissingConfigError {
                field: format!("connections.{}", conn_id),
            })
    }
}
