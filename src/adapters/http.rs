use crate::config::connections::Connection;
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A reusable HTTP transport bound to the host of a named connection.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    conn_id: String,
    host: String,
    client: Client,
}

impl HttpConnection {
    pub fn from_connection(conn_id: &str, connection: &Connection) -> Result<Self> {
        let host = connection
            .host
            .as_deref()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: format!("connections.{}.host", conn_id),
            })?;

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!connection.verify);
        if let Some(seconds) = connection.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        if !connection.verify {
            tracing::warn!(conn_id, "TLS certificate verification disabled");
        }

        Ok(Self {
            conn_id: conn_id.to_string(),
            host: host.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.host, endpoint.trim_start_matches('/'))
    }

    pub async fn get(&self, endpoint: &str) -> std::result::Result<Response, reqwest::Error> {
        let url = self.url_for(endpoint);
        tracing::debug!(conn_id = %self.conn_id, "GET {}", url);
        self.client.get(url).send().await
    }
}
