#[cfg(feature = "lambda")]
use github_csv_etl::utils::logger::{self, TracingObserver};
#[cfg(feature = "lambda")]
use github_csv_etl::{EtlConfig, EtlEngine, RunSummary, StageCommand};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use std::sync::Arc;

/// Scheduled event payload, e.g. `{"stage": "run"}`.
#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    #[serde(default = "default_stage")]
    pub stage: String,
    pub config_path: Option<String>,
}

#[cfg(feature = "lambda")]
fn default_stage() -> String {
    "run".to_string()
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub files: Vec<String>,
    pub failed: Vec<String>,
}

#[cfg(feature = "lambda")]
fn parse_stage(stage: &str) -> Option<StageCommand> {
    match stage {
        "list" | "list_files" => Some(StageCommand::List),
        "fetch" | "fetch_all" => Some(StageCommand::Fetch),
        "transform_and_load" | "transform-and-load" => Some(StageCommand::TransformAndLoad),
        "run" => Some(StageCommand::Run),
        _ => None,
    }
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    let command = parse_stage(&event.payload.stage)
        .ok_or_else(|| format!("unknown stage '{}'", event.payload.stage))?;
    tracing::info!("Starting ETL Lambda function for stage {:?}", command);

    let config_path = event
        .payload
        .config_path
        .or_else(|| std::env::var("ETL_CONFIG").ok())
        .unwrap_or_else(|| "etl-config.toml".to_string());
    let config = EtlConfig::from_file_or_default(&config_path)?;

    let engine = EtlEngine::from_config(&config, Arc::new(TracingObserver))?;
    let summary = engine.execute(command).await?;

    let files: Vec<String> = match &summary {
        RunSummary::Listed(files) => files.iter().map(|f| f.name.clone()).collect(),
        RunSummary::Fetched(report) | RunSummary::Loaded(report) => {
            report.outcomes.iter().map(|o| o.name.clone()).collect()
        }
    };
    let failed: Vec<String> = summary
        .report()
        .map(|report| report.failures().map(|o| o.name.clone()).collect())
        .unwrap_or_default();
    let response = Response {
        message: format!(
            "{:?} finished: {} files, {} failed",
            command,
            files.len(),
            failed.len()
        ),
        files,
        failed,
    };

    tracing::info!("{}", response.message);
    Ok(response)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
