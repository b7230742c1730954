// Crawl-and-enrich pipeline: discovery, filtering, extraction and persistence

pub mod dedup;
pub mod discovery;
pub mod extraction;
pub mod filter;
pub mod persistence;
pub mod prompt;
pub mod runner;

pub use dedup::ExistingUrlIndex;
pub use extraction::{ModelPolicy, VisionExtractor};
pub use filter::EventFilter;
pub use persistence::{PersistOutcome, PersistStatus, PersistenceSinks};
pub use runner::{Pipeline, RunOptions, RunSummary};
