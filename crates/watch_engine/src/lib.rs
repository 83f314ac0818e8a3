//! Watch engine: fetching, dedup storage, monitor tasks, broadcasting and the
//! polling runner.
mod broadcast;
mod document;
mod fetch;
mod filename;
mod index;
mod persist;
mod runner;
mod store;
mod task;
mod types;

pub use broadcast::{
    BroadcastError, Broadcaster, DeliveryError, EmailBroadcaster, EmailConfig, EmailConfigError,
    LogBroadcaster,
};
pub use document::html_paragraphs;
pub use fetch::{decode_body, FetchSettings, Fetcher, MemoryFetcher, ReqwestFetcher};
pub use filename::message_filename;
pub use index::{AnchorIndexSource, IndexSource, StaticIndexSource};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use runner::{CycleReport, Runner};
pub use store::{DedupStore, MemoryDedupStore, SeenEntry, SqliteDedupStore, StoreError};
pub use task::{MonitorTask, TaskError};
pub use types::{FailureKind, FetchError, TaskId};
