pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::{Connection, ConnectionRegistry, EtlConfig};

pub use core::{
    cleaner::{clean, ImputationPolicy},
    etl::{EtlEngine, RunSummary, StageCommand},
    pipeline::CsvPipeline,
    staging::StagingArea,
    table::Table,
};
pub use utils::error::{EtlError, Result, UploadError};
