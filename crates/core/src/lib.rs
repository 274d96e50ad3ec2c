pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod identity;
pub mod index;
pub mod metrics;
pub mod pipeline;
pub mod resolve;

#[cfg(test)]
mod edge_cases;

pub use classify::{classify, BucketProfile};
pub use config::EngineConfig;
pub use emit::{Emitter, UnitSet};
pub use error::{EngineError, MalformedRecord, Rejected, Result};
pub use identity::KeyBuilder;
pub use index::{Bucket, GroupingIndex};
pub use metrics::{RunStats, StatsCollector};
pub use pipeline::{AbortHandle, Pipeline, ProjectRun, TranslationUnit};

use protocol::DeclarationRecord;

/// Single translation unit merge with the default configuration.
pub fn merge_records(records: Vec<DeclarationRecord>) -> Result<UnitSet> {
    Pipeline::default().run_translation_unit(&TranslationUnit::new("<records>", records))
}
