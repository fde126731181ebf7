use crate::domain::model::FileState;
use crate::domain::ports::PipelineObserver;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("github_csv_etl=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("github_csv_etl=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_lambda_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("github_csv_etl=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .without_time()
                .json(), // CloudWatch picks up structured fields
        )
        .init();
}

/// Forwards pipeline events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn files_listed(&self, names: &[String]) {
        tracing::info!(count = names.len(), files = ?names, "Found CSV files");
    }

    fn transition(&self, name: &str, state: &FileState) {
        match state {
            FileState::Failed { stage, reason } => {
                tracing::error!(file = name, %stage, reason = %reason, "File failed")
            }
            FileState::Uploaded { blob } => {
                tracing::info!(file = name, location = %blob.location, "Uploaded")
            }
            other => tracing::debug!(file = name, state = ?other, "File advanced"),
        }
    }

    fn warning(&self, name: &str, message: &str) {
        tracing::warn!(file = name, "{}", message);
    }

    fn batch_finished(&self, uploaded: usize, failed: usize) {
        if failed == 0 {
            tracing::info!(uploaded, "Batch finished");
        } else {
            tracing::warn!(uploaded, failed, "Batch finished with per-file failures");
        }
    }
}

/// Keeps every event in memory; handy for assertions and dry runs.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Listed(Vec<String>),
    Transition(String, FileState),
    Warning(String, String),
    Finished { uploaded: usize, failed: usize },
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States visited by one file, in order.
    pub fn states_of(&self, name: &str) -> Vec<FileState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::Transition(file, state) if file == name => Some(state),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl PipelineObserver for RecordingObserver {
    fn files_listed(&self, names: &[String]) {
        self.push(ObservedEvent::Listed(names.to_vec()));
    }

    fn transition(&self, name: &str, state: &FileState) {
        self.push(ObservedEvent::Transition(name.to_string(), state.clone()));
    }

    fn warning(&self, name: &str, message: &str) {
        self.push(ObservedEvent::Warning(name.to_string(), message.to_string()));
    }

    fn batch_finished(&self, uploaded: usize, failed: usize) {
        self.push(ObservedEvent::Finished { uploaded, failed });
    }
}
