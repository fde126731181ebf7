use crate::domain::model::Stage;
use thiserror::Error;

/// Failures of the upload stage.
///
/// `InvalidCredential` poisons every upload of the batch; `Transport` only the file at hand.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("invalid credential for connection '{conn_id}': {reason}")]
    InvalidCredential { conn_id: String, reason: String },

    #[error("upload of '{blob_name}' failed: {message}")]
    Transport { blob_name: String, message: String },
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Listing failed for {url}: {message}")]
    ListingError { url: String, message: String },

    #[error("Fetch of '{name}' failed ({}): {message}", describe_status(.status))]
    FetchError {
        name: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Could not parse '{name}' as a table: {message}")]
    ParseError { name: String, message: String },

    #[error("Invalid imputation policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error(transparent)]
    UploadError(#[from] UploadError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Affects a single file; the batch carries on.
    Low,
    /// Transient infrastructure failure; a re-run may succeed.
    Medium,
    /// Misconfiguration; a re-run will fail the same way.
    High,
    /// The batch cannot produce its output: nothing to work on, or nowhere to put it.
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that ended with an error of this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::FetchError { .. }
            | EtlError::ParseError { .. }
            | EtlError::UploadError(UploadError::Transport { .. }) => ErrorSeverity::Low,
            EtlError::ApiError(_) | EtlError::IoError(_) => ErrorSeverity::Medium,
            EtlError::InvalidPolicy { .. }
            | EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            EtlError::ListingError { .. }
            | EtlError::UploadError(UploadError::InvalidCredential { .. }) => {
                ErrorSeverity::Critical
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => ErrorSeverity::Low,
        }
    }

    /// Whether this error makes the rest of the batch meaningless.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            EtlError::ListingError { .. }
                | EtlError::InvalidPolicy { .. }
                | EtlError::UploadError(UploadError::InvalidCredential { .. })
                | EtlError::ConfigError { .. }
                | EtlError::MissingConfigError { .. }
                | EtlError::InvalidConfigValueError { .. }
        )
    }

    /// Stage label used when this error fails a single file.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EtlError::ListingError { .. } => Some(Stage::List),
            EtlError::FetchError { .. } => Some(Stage::Fetch),
            EtlError::ParseError { .. } | EtlError::InvalidPolicy { .. } => Some(Stage::Clean),
            EtlError::UploadError(_) => Some(Stage::Upload),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ListingError { .. } => {
                "Check the owner/repo/folder settings and that the listing API is reachable"
            }
            EtlError::FetchError { .. } | EtlError::ApiError(_) => {
                "Re-run the job; the file will be fetched again"
            }
            EtlError::ParseError { .. } | EtlError::CsvError(_) => {
                "Inspect the staged file; it is not delimited tabular data"
            }
            EtlError::InvalidPolicy { .. } => {
                "Set transform.policy to one of: drop, fill, mean (fill needs transform.fill_value)"
            }
            EtlError::UploadError(UploadError::InvalidCredential { .. }) => {
                "Add extra.connection_string to the upload connection record"
            }
            EtlError::UploadError(UploadError::Transport { .. }) => {
                "Check object store availability and re-run the job"
            }
            EtlError::IoError(_) => "Check staging directory permissions and free space",
            EtlError::SerializationError(_) => "Check the shape of the API response",
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => "Fix the configuration file and retry",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no response".to_string(),
    }
}
