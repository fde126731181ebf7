use crate::core::cleaner::{clean, ImputationPolicy};
use crate::core::fetcher::Fetcher;
use crate::core::lister::Lister;
use crate::core::staging::StagingArea;
use crate::core::table::Table;
use crate::core::uploader::Uploader;
use crate::config::toml_config::SourceConfig;
use crate::domain::model::{BatchReport, BlobIdentity, FileDescriptor, FileState, Stage, StagedFile};
use crate::domain::ports::PipelineObserver;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;

/// Why one file stopped advancing.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: EtlError,
}

impl StageFailure {
    fn at(stage: Stage) -> impl FnOnce(EtlError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

/// Drives list → fetch → clean → save → upload, one file at a time.
///
/// A failing file is recorded and skipped. Only errors that make the whole batch
/// meaningless stop a run.
pub struct CsvPipeline {
    lister: Lister,
    fetcher: Fetcher,
    source: SourceConfig,
    policy: ImputationPolicy,
    observer: Arc<dyn PipelineObserver>,
}

impl CsvPipeline {
    pub fn new(
        lister: Lister,
        fetcher: Fetcher,
        source: SourceConfig,
        policy: ImputationPolicy,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            lister,
            fetcher,
            source,
            policy,
            observer,
        }
    }

    pub fn policy(&self) -> &ImputationPolicy {
        &self.policy
    }

    pub async fn list_files(&self) -> Result<Vec<FileDescriptor>> {
        self.lister
            .list_csv_files(
                &self.source.owner,
                &self.source.repo,
                &self.source.folder_path,
                self.observer.as_ref(),
            )
            .await
    }

    /// Stages every listed file. Failed downloads are reported, not raised.
    pub async fn fetch_all(&self, files: &[FileDescriptor], staging: &StagingArea) -> BatchReport {
        let mut report = BatchReport::start();
        let listed: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        match staging.prune(&listed) {
            Ok(removed) if !removed.is_empty() => {
                tracing::info!(files = ?removed, "Removed staged files no longer listed")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not prune staging area"),
        }
        for (name, result) in self.fetcher.fetch_all(files, staging).await {
            self.observer.transition(&name, &FileState::Listed);
            let state = match result {
                Ok(_) => FileState::Fetched,
                Err(error) => failed(Stage::Fetch, &error),
            };
            self.observer.transition(&name, &state);
            report.record(&name, state);
        }
        self.finish(&mut report);
        report
    }

    /// Cleans and uploads every CSV file already in the staging area.
    pub async fn transform_and_load(
        &self,
        staging: &StagingArea,
        uploader: &Uploader,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::start();
        let mut fatal = None;

        for name in staging.staged_csv_files()? {
            let outcome = match staging.read(&name) {
                Ok(staged) => {
                    self.observer.transition(&name, &FileState::Fetched);
                    self.process_staged(&staged, staging, uploader).await
                }
                Err(error) => Err(StageFailure {
                    stage: Stage::Clean,
                    error,
                }),
            };
            self.settle(&name, outcome, &mut report, &mut fatal);
        }

        self.finish(&mut report);
        fatal.map_or(Ok(report), Err)
    }

    /// Full batch: list once, then take each file through every stage before the next.
    pub async fn run(&self, staging: &StagingArea, uploader: &Uploader) -> Result<BatchReport> {
        let files = self.list_files().await?;
        let mut report = BatchReport::start();
        let mut fatal = None;

        for file in &files {
            self.observer.transition(&file.name, &FileState::Listed);
            let outcome = match self.fetcher.fetch_file(&file.name, staging).await {
                Ok(staged) => {
                    self.observer.transition(&file.name, &FileState::Fetched);
                    self.process_staged(&staged, staging, uploader).await
                }
                Err(error) => Err(StageFailure {
                    stage: Stage::Fetch,
                    error,
                }),
            };
            self.settle(&file.name, outcome, &mut report, &mut fatal);
        }

        self.finish(&mut report);
        fatal.map_or(Ok(report), Err)
    }

    async fn process_staged(
        &self,
        staged: &StagedFile,
        staging: &StagingArea,
        uploader: &Uploader,
    ) -> std::result::Result<BlobIdentity, StageFailure> {
        let name = staged.name.as_str();

        let table = Table::parse(name, &staged.content).map_err(StageFailure::at(Stage::Clean))?;
        tracing::debug!(file = name, rows = table.row_count(), schema = ?table.schema(), "Parsed");
        let cleaned = clean(table, &self.policy);
        for column in cleaned.columns().iter().filter(|c| c.mean_undefined) {
            self.observer.warning(
                name,
                &format!(
                    "column '{}' has no values to average; missing cells left empty",
                    column.name
                ),
            );
        }
        self.observer.transition(name, &FileState::Cleaned);

        let bytes = cleaned.to_csv_bytes().map_err(StageFailure::at(Stage::Save))?;
        let saved = staging
            .write(name, bytes)
            .map_err(StageFailure::at(Stage::Save))?;
        self.observer.transition(name, &FileState::Saved);

        uploader
            .upload(&saved.local_path)
            .await
            .map_err(StageFailure::at(Stage::Upload))
    }

    fn settle(
        &self,
        name: &str,
        outcome: std::result::Result<BlobIdentity, StageFailure>,
        report: &mut BatchReport,
        fatal: &mut Option<EtlError>,
    ) {
        let state = match outcome {
            Ok(blob) => FileState::Uploaded { blob },
            Err(StageFailure { stage, error }) => {
                let state = failed(stage, &error);
                if error.is_batch_fatal() && fatal.is_none() {
                    *fatal = Some(error);
                }
                state
            }
        };
        self.observer.transition(name, &state);
        report.record(name, state);
    }

    fn finish(&self, report: &mut BatchReport) {
        report.finish();
        self.observer
            .batch_finished(report.uploaded().count(), report.failures().count());
    }
}

fn failed(stage: Stage, error: &EtlError) -> FileState {
    FileState::Failed {
        stage,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::HttpConnection;
    use crate::config::connections::Connection;
    use crate::domain::model::UploadTarget;
    use crate::domain::ports::BlobStore;
    use crate::utils::error::UploadError;
    use crate::utils::logger::RecordingObserver;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl BlobStore for MemoryStore {
        async fn upload(
            &self,
            container: &str,
            blob_name: &str,
            data: Vec<u8>,
        ) -> std::result::Result<BlobIdentity, UploadError> {
            if self.reject.as_deref() == Some(blob_name) {
                return Err(UploadError::Transport {
                    blob_name: blob_name.to_string(),
                    message: "503 Service Unavailable".to_string(),
                });
            }
            self.blobs.lock().await.insert(blob_name.to_string(), data);
            Ok(BlobIdentity {
                container: container.to_string(),
                blob_name: blob_name.to_string(),
                location: format!("memory://{}/{}", container, blob_name),
            })
        }
    }

    fn target() -> UploadTarget {
        UploadTarget {
            container_name: "jobs".to_string(),
            conn_id: "blob".to_string(),
        }
    }

    fn pipeline_for(
        server: &MockServer,
        policy: ImputationPolicy,
        observer: Arc<RecordingObserver>,
    ) -> CsvPipeline {
        let source = SourceConfig {
            api_base: server.url("/repos"),
            owner: "acme".to_string(),
            repo: "data".to_string(),
            branch: "main".to_string(),
            folder_path: "exports".to_string(),
            raw_conn_id: "raw".to_string(),
        };
        let connection =
            HttpConnection::from_connection("raw", &Connection::http(server.base_url())).unwrap();
        CsvPipeline::new(
            Lister::new(&source.api_base).unwrap(),
            Fetcher::new(connection, source.raw_base_path()),
            source,
            policy,
            observer,
        )
    }

    fn mock_listing(server: &MockServer, names: &[&str]) {
        let entries: Vec<serde_json::Value> = names
            .iter()
            .map(|n| serde_json::json!({ "name": n }))
            .collect();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/data/contents/exports");
            then.status(200).json_body(serde_json::Value::Array(entries));
        });
    }

    fn mock_file(server: &MockServer, name: &str, status: u16, body: &[u8]) {
        let path = format!("/acme/data/main/exports/{}", name);
        let body = body.to_vec();
        server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(status).body(body);
        });
    }

    #[tokio::test]
    async fn test_run_walks_every_state_in_order() {
        let server = MockServer::start();
        mock_listing(&server, &["A.csv"]);
        mock_file(&server, "A.csv", 200, b"id,val\n1,\n2,4\n");

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(
            &server,
            ImputationPolicy::FillNumericWithColumnMean,
            observer.clone(),
        );
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();

        let report = pipeline.run(&staging, &uploader).await.unwrap();

        assert!(report.is_clean());
        let states = observer.states_of("A.csv");
        assert_eq!(states.len(), 5);
        assert_eq!(states[0], FileState::Listed);
        assert_eq!(states[1], FileState::Fetched);
        assert_eq!(states[2], FileState::Cleaned);
        assert_eq!(states[3], FileState::Saved);
        assert!(matches!(states[4], FileState::Uploaded { .. }));

        let blobs = store.blobs.lock().await;
        assert_eq!(blobs.get("A.csv").unwrap(), b"id,val\n1,4.0\n2,4.0\n");
        // Cleaned content replaced the raw file in staging.
        assert_eq!(
            staging.read("A.csv").unwrap().content,
            b"id,val\n1,4.0\n2,4.0\n"
        );
    }

    #[tokio::test]
    async fn test_unparseable_file_is_isolated() {
        let server = MockServer::start();
        mock_listing(&server, &["a.csv", "broken.csv", "c.csv"]);
        mock_file(&server, "a.csv", 200, b"x\n1\n");
        mock_file(&server, "broken.csv", 200, &[0xff, 0xfe, 0xfd]);
        mock_file(&server, "c.csv", 200, b"y\n2\n");

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(
            &server,
            ImputationPolicy::FillNumericWithColumnMean,
            observer.clone(),
        );
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();

        let report = pipeline.run(&staging, &uploader).await.unwrap();

        assert_eq!(report.uploaded().count(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "broken.csv");
        assert!(matches!(
            failures[0].state,
            FileState::Failed {
                stage: Stage::Clean,
                ..
            }
        ));
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "broken.csv", "c.csv"]);
        assert!(!store.blobs.lock().await.contains_key("broken.csv"));
    }

    #[tokio::test]
    async fn test_transport_failure_skips_only_that_file() {
        let server = MockServer::start();
        mock_listing(&server, &["a.csv", "b.csv"]);
        mock_file(&server, "a.csv", 200, b"x\n1\n");
        mock_file(&server, "b.csv", 200, b"x\n2\n");

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(&server, ImputationPolicy::DropRowsWithAnyMissing, observer);
        let store = Arc::new(MemoryStore {
            reject: Some("a.csv".to_string()),
            ..MemoryStore::default()
        });
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();

        let report = pipeline.run(&staging, &uploader).await.unwrap();

        assert!(matches!(
            report.outcome("a.csv").unwrap().state,
            FileState::Failed {
                stage: Stage::Upload,
                ..
            }
        ));
        assert!(matches!(
            report.outcome("b.csv").unwrap().state,
            FileState::Uploaded { .. }
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/data/contents/exports");
            then.status(500);
        });

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(&server, ImputationPolicy::DropRowsWithAnyMissing, observer);
        let uploader = Uploader::with_store(target(), Arc::new(MemoryStore::default()));
        let staging = StagingArea::scoped().unwrap();

        let result = pipeline.run(&staging, &uploader).await;
        assert!(matches!(result, Err(EtlError::ListingError { .. })));
    }

    #[tokio::test]
    async fn test_all_missing_column_is_reported() {
        let server = MockServer::start();
        mock_listing(&server, &["e.csv"]);
        mock_file(&server, "e.csv", 200, b"a,b\n1,\n2,\n");

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(
            &server,
            ImputationPolicy::FillNumericWithColumnMean,
            observer.clone(),
        );
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();

        let report = pipeline.run(&staging, &uploader).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(store.blobs.lock().await.get("e.csv").unwrap(), b"a,b\n1,\n2,\n");
        assert!(observer.events().iter().any(|event| matches!(
            event,
            crate::utils::logger::ObservedEvent::Warning(file, message)
                if file == "e.csv" && message.contains("'b'")
        )));
    }

    #[tokio::test]
    async fn test_transform_and_load_reads_staging_directory() {
        let server = MockServer::start();
        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(
            &server,
            ImputationPolicy::FillWithConstant("0".to_string()),
            observer,
        );
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();
        staging.write("b.csv", b"k,v\nx,\n".to_vec()).unwrap();
        staging.write("a.csv", b"k,v\ny,1\n".to_vec()).unwrap();
        staging.write("skip.txt", b"ignored".to_vec()).unwrap();

        let report = pipeline.transform_and_load(&staging, &uploader).await.unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(store.blobs.lock().await.get("b.csv").unwrap(), b"k,v\nx,0.0\n");
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_nothing_to_load() {
        let server = MockServer::start();
        mock_listing(&server, &["A.csv", "B.csv"]);
        mock_file(&server, "A.csv", 200, b"id,val\n1,\n2,4\n");
        mock_file(&server, "B.csv", 404, b"");

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = pipeline_for(&server, ImputationPolicy::FillNumericWithColumnMean, observer);
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::with_store(target(), store.clone());
        let staging = StagingArea::scoped().unwrap();
        staging.write("B.csv", b"id\n7\n".to_vec()).unwrap();
        staging.write("gone.csv", b"id\n8\n".to_vec()).unwrap();

        let files = pipeline.list_files().await.unwrap();
        let fetched = pipeline.fetch_all(&files, &staging).await;
        assert_eq!(fetched.failures().count(), 1);
        assert_eq!(staging.staged_csv_files().unwrap(), vec!["A.csv"]);

        let loaded = pipeline.transform_and_load(&staging, &uploader).await.unwrap();
        let names: Vec<&str> = loaded.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A.csv"]);
        let blobs = store.blobs.lock().await;
        assert!(!blobs.contains_key("B.csv"));
        assert!(!blobs.contains_key("gone.csv"));
    }
}
