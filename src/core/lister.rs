use crate::adapters::http::USER_AGENT;
use crate::domain::model::FileDescriptor;
use crate::domain::ports::PipelineObserver;
use crate::utils::error::{EtlError, Result};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
struct ListingEntry {
    name: String,
}

pub fn is_csv_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Reads a repository folder through the contents API and keeps the CSV entries.
#[derive(Debug, Clone)]
pub struct Lister {
    client: Client,
    api_base: String,
}

impl Lister {
    pub fn new(api_base: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn listing_url(&self, owner: &str, repo: &str, folder_path: &str) -> String {
        format!(
            "{}/{}/{}/contents/{}",
            self.api_base,
            owner,
            repo,
            folder_path.trim_matches('/')
        )
    }

    pub async fn list_csv_files(
        &self,
        owner: &str,
        repo: &str,
        folder_path: &str,
        observer: &dyn PipelineObserver,
    ) -> Result<Vec<FileDescriptor>> {
        let url = self.listing_url(owner, repo, folder_path);
        let listing_error = |message: String| EtlError::ListingError {
            url: url.clone(),
            message,
        };

        tracing::debug!("Listing {}", url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| listing_error(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(listing_error(format!("unexpected status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| listing_error(format!("could not read body: {}", e)))?;
        let entries: Vec<ListingEntry> = serde_json::from_str(&body)
            .map_err(|e| listing_error(format!("expected a list of named entries: {}", e)))?;

        let mut seen = HashSet::new();
        let files: Vec<FileDescriptor> = entries
            .into_iter()
            .filter(|entry| is_csv_name(&entry.name))
            .filter(|entry| seen.insert(entry.name.clone()))
            .map(|entry| FileDescriptor { name: entry.name })
            .collect();

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        observer.files_listed(&names);
        Ok(files)
    }
}
