use crate::config::connections::{ConnectionRegistry, DEFAULT_RAW_CONN_ID};
use crate::core::cleaner::ImputationPolicy;
use crate::domain::model::UploadTarget;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub source: SourceConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub staging: StagingConfig,
    pub connections: ConnectionRegistry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base of the directory-listing API, up to and excluding `/{owner}`.
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub folder_path: String,
    /// Named connection used for raw file downloads.
    pub raw_conn_id: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com/repos".to_string(),
            owner: "microsoft".to_string(),
            repo: "sql-server-samples".to_string(),
            branch: "master".to_string(),
            folder_path: "samples/databases/adventure-works/data-warehouse-install-script"
                .to_string(),
            raw_conn_id: DEFAULT_RAW_CONN_ID.to_string(),
        }
    }
}

impl SourceConfig {
    /// `/{owner}/{repo}/{branch}/{folder_path}/`, the prefix raw file names are appended to.
    pub fn raw_base_path(&self) -> String {
        format!(
            "/{}/{}/{}/{}/",
            self.owner,
            self.repo,
            self.branch,
            self.folder_path.trim_matches('/')
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub policy: String,
    pub fill_value: Option<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            policy: "mean".to_string(),
            fill_value: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub container: String,
    pub conn_id: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            container: "airflow-jobs".to_string(),
            conn_id: "azure_blob_conn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Persistent staging directory. Without one, full runs stage into a temporary
    /// directory that is removed afterwards.
    pub dir: Option<String>,
}

impl EtlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Like [`EtlConfig::from_file`], but a missing file yields the defaults.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::info!(
                "No configuration file at {}, using defaults",
                path.as_ref().display()
            );
            let mut config = Self::default();
            config.connections.ensure_defaults();
            Ok(config)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
                message: format!("TOML parsing error: {}", e),
            })?;
        config.connections.ensure_defaults();
        Ok(config)
    }

    /// 替換環境變數 (例如 ${BLOB_CONNECTION_STRING})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn policy(&self) -> Result<ImputationPolicy> {
        ImputationPolicy::from_name(&self.transform.policy, self.transform.fill_value.as_deref())
    }

    pub fn upload_target(&self) -> UploadTarget {
        UploadTarget {
            container_name: self.load.container.clone(),
            conn_id: self.load.conn_id.clone(),
        }
    }

    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.staging.dir.as_ref().map(PathBuf::from)
    }
}

impl Validate for EtlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("source.api_base", &self.source.api_base)?;
        validation::validate_path_segment("source.owner", &self.source.owner)?;
        validation::validate_path_segment("source.repo", &self.source.repo)?;
        validation::validate_path_segment("source.branch", &self.source.branch)?;
        validation::validate_non_empty_string("source.folder_path", &self.source.folder_path)?;

        let raw = self.connections.get(&self.source.raw_conn_id)?;
        let host = validation::validate_required_field(
            &format!("connections.{}.host", self.source.raw_conn_id),
            &raw.host,
        )?;
        validation::validate_url(&format!("connections.{}.host", self.source.raw_conn_id), host)?;

        self.policy()?;

        validation::validate_non_empty_string("load.container", &self.load.container)?;
        validation::validate_non_empty_string("load.conn_id", &self.load.conn_id)?;

        if let Some(dir) = &self.staging.dir {
            validation::validate_path("staging.dir", dir)?;
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EtlConfig::from_toml_str("").unwrap();

        assert_eq!(config.source.owner, "microsoft");
        assert_eq!(config.load.container, "airflow-jobs");
        assert_eq!(config.policy().unwrap(), ImputationPolicy::FillNumericWithColumnMean);
        assert_eq!(
            config.source.raw_base_path(),
            "/microsoft/sql-server-samples/master/samples/databases/adventure-works/data-warehouse-install-script/"
        );
        assert!(config.connections.get("github_raw").is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[source]
owner = "acme"
repo = "data"
branch = "main"
folder_path = "/exports/"

[transform]
policy = "fill"
fill_value = "0"

[load]
container = "cleaned"
conn_id = "blob"

[staging]
dir = "/var/tmp/etl"

[connections.blob]
conn_type = "blob"
extra = { connection_string = "Provider=local;Root=/srv/blobs" }
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.source.raw_base_path(), "/acme/data/main/exports/");
        assert_eq!(
            config.policy().unwrap(),
            ImputationPolicy::FillWithConstant("0".to_string())
        );
        assert_eq!(config.upload_target().container_name, "cleaned");
        assert_eq!(
            config.connections.get("blob").unwrap().connection_string(),
            Some("Provider=local;Root=/srv/blobs")
        );
        // The raw-file connection is still available.
        assert!(config.connections.get("github_raw").is_ok());
        assert_eq!(config.staging_dir(), Some(PathBuf::from("/var/tmp/etl")));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_BLOB_CONN", "Provider=local;Root=/data");

        let toml_content = r#"
[connections.azure_blob_conn]
conn_type = "blob"
extra = { connection_string = "${TEST_BLOB_CONN}" }
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config
                .connections
                .get("azure_blob_conn")
                .unwrap()
                .connection_string(),
            Some("Provider=local;Root=/data")
        );

        std::env::remove_var("TEST_BLOB_CONN");
    }

    #[test]
    fn test_invalid_policy_fails_validation() {
        let config = EtlConfig::from_toml_str("[transform]\npolicy = \"median\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_invalid_source_fails_validation() {
        let config = EtlConfig::from_toml_str("[source]\nowner = \"a/b\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = EtlConfig::from_toml_str("[source]\napi_base = \"nope\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[load]\ncontainer = \"from-file\"\n")
            .unwrap();

        let config = EtlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.load.container, "from-file");

        let missing = EtlConfig::from_file_or_default("/definitely/not/here.toml").unwrap();
        assert_eq!(missing.load.container, "airflow-jobs");
    }
}
