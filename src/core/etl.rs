use crate::adapters::http::HttpConnection;
use crate::config::connections::ConnectionRegistry;
use crate::config::toml_config::EtlConfig;
use crate::core::fetcher::Fetcher;
use crate::core::lister::Lister;
use crate::core::pipeline::CsvPipeline;
use crate::core::staging::StagingArea;
use crate::core::uploader::Uploader;
use crate::domain::model::{BatchReport, FileDescriptor, UploadTarget};
use crate::domain::ports::PipelineObserver;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::path::PathBuf;
use std::sync::Arc;

/// The entry points a scheduler can trigger, each safe to re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCommand {
    List,
    Fetch,
    TransformAndLoad,
    Run,
}

#[derive(Debug, Clone)]
pub enum RunSummary {
    Listed(Vec<FileDescriptor>),
    Fetched(BatchReport),
    Loaded(BatchReport),
}

impl RunSummary {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            RunSummary::Listed(_) => None,
            RunSummary::Fetched(report) | RunSummary::Loaded(report) => Some(report),
        }
    }
}

pub struct EtlEngine {
    pipeline: CsvPipeline,
    connections: ConnectionRegistry,
    target: UploadTarget,
    staging_dir: Option<PathBuf>,
}

impl EtlEngine {
    pub fn new(
        pipeline: CsvPipeline,
        connections: ConnectionRegistry,
        target: UploadTarget,
        staging_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            connections,
            target,
            staging_dir,
        }
    }

    /// Validates `config` and wires the pipeline. A bad policy fails here, before any file is touched.
    pub fn from_config(config: &EtlConfig, observer: Arc<dyn PipelineObserver>) -> Result<Self> {
        config.validate()?;

        let source = config.source.clone();
        let raw = config.connections.get(&source.raw_conn_id)?;
        let connection = HttpConnection::from_connection(&source.raw_conn_id, raw)?;
        let pipeline = CsvPipeline::new(
            Lister::new(&source.api_base)?,
            Fetcher::new(connection, source.raw_base_path()),
            source,
            config.policy()?,
            observer,
        );

        Ok(Self::new(
            pipeline,
            config.connections.clone(),
            config.upload_target(),
            config.staging_dir(),
        ))
    }

    pub async fn execute(&self, command: StageCommand) -> Result<RunSummary> {
        tracing::info!("Starting {:?} with policy {}", command, self.pipeline.policy());
        match command {
            StageCommand::List => Ok(RunSummary::Listed(self.pipeline.list_files().await?)),
            StageCommand::Fetch => {
                let staging = self.shared_staging()?;
                let files = self.pipeline.list_files().await?;
                Ok(RunSummary::Fetched(
                    self.pipeline.fetch_all(&files, &staging).await,
                ))
            }
            StageCommand::TransformAndLoad => {
                let staging = self.shared_staging()?;
                let uploader = self.resolve_uploader().await;
                let report = self.pipeline.transform_and_load(&staging, &uploader).await?;
                Ok(RunSummary::Loaded(report))
            }
            StageCommand::Run => {
                let staging = match &self.staging_dir {
                    Some(dir) => StagingArea::persistent(dir)?,
                    None => StagingArea::scoped()?,
                };
                let uploader = self.resolve_uploader().await;
                let result = self.pipeline.run(&staging, &uploader).await;
                if let Err(e) = staging.close() {
                    tracing::warn!("Could not remove staging area: {}", e);
                }
                Ok(RunSummary::Loaded(result?))
            }
        }
    }

    async fn resolve_uploader(&self) -> Uploader {
        Uploader::resolve(&self.connections, self.target.clone()).await
    }

    /// Separately triggered stages hand files over through a directory that outlives the process.
    fn shared_staging(&self) -> Result<StagingArea> {
        let dir = self
            .staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("github-csv-etl"));
        StagingArea::persistent(dir)
    }
}
