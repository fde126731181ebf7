pub mod cleaner;
pub mod etl;
pub mod fetcher;
pub mod lister;
pub mod pipeline;
pub mod staging;
pub mod table;
pub mod uploader;

pub use crate::domain::model::{BatchReport, FileDescriptor, FileState, Stage, StagedFile};
pub use crate::domain::ports::{BlobStore, PipelineObserver};
pub use crate::utils::error::Result;
