//! Per-translation-unit runs and the cross-unit merge that follows them.
//!
//! Each translation unit owns its own [`GroupingIndex`]; units are only
//! combined after every per-unit task has finished, by feeding the immutable
//! per-unit results through the same index, classifier and resolver again.

use protocol::{DeclarationRecord, Diagnostic, DiagnosticKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::classify::{classify_profile, BucketProfile};
use crate::config::EngineConfig;
use crate::emit::{Emitter, UnitSet};
use crate::error::{EngineError, Result};
use crate::index::GroupingIndex;
use crate::metrics::{RunStats, StatsCollector};
use crate::resolve::resolve;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub name: String,
    pub records: Vec<DeclarationRecord>,
}

impl TranslationUnit {
    pub fn new(name: impl Into<String>, records: Vec<DeclarationRecord>) -> Self {
        Self { name: name.into(), records }
    }
}

/// Shared flag that abandons in-flight per-unit work.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRun {
    pub units: UnitSet,
    pub stats: RunStats,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    config: EngineConfig,
    abort: AbortHandle,
}

impl Pipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, abort: AbortHandle::default() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn run_translation_unit(&self, tu: &TranslationUnit) -> Result<UnitSet> {
        self.run_unit_with_stats(tu).map(|(set, _)| set)
    }

    fn run_unit_with_stats(&self, tu: &TranslationUnit) -> Result<(UnitSet, RunStats)> {
        debug!("Merging translation unit {} ({} records)", tu.name, tu.records.len());
        let mut stats = StatsCollector::new();
        stats.record_translation_unit(tu.records.len());

        stats.start_phase("group");
        let mut index = GroupingIndex::new();
        for record in &tu.records {
            if self.abort.is_aborted() {
                return Err(EngineError::Aborted(tu.name.clone()));
            }
            index.insert_record(record);
        }
        stats.end_phase("group");

        let set = self.fold(index, Vec::new(), &mut stats);
        Ok((set, stats.snapshot()))
    }

    /// Cross-unit pass over already emitted unit sets, in the order given.
    ///
    /// Structural diagnostics from the inputs are carried forward; bucket
    /// diagnostics are recomputed from the merged view.
    pub fn merge_unit_sets(&self, sets: Vec<UnitSet>) -> UnitSet {
        self.merge_with_stats(sets, &mut StatsCollector::new())
    }

    fn merge_with_stats(&self, sets: Vec<UnitSet>, stats: &mut StatsCollector) -> UnitSet {
        stats.start_phase("group");
        let mut index = GroupingIndex::new();
        let mut carried: Vec<Diagnostic> = Vec::new();
        for set in sets {
            carried.extend(set.diagnostics.into_iter().filter(|d| d.kind == DiagnosticKind::Malformed));
            for unit in set.units {
                index.insert_unit(unit);
            }
        }
        stats.end_phase("group");

        self.fold(index, carried, stats)
    }

    /// Runs every translation unit in parallel, waits for all of them, then
    /// merges their results. An abort discards everything computed so far.
    pub fn run_project(&self, units: &[TranslationUnit]) -> Result<ProjectRun> {
        info!("Merging {} translation units", units.len());
        let mut stats = StatsCollector::new();

        stats.start_phase("per_unit");
        let per_unit = match self.config.jobs {
            Some(jobs) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
                pool.install(|| self.run_units_parallel(units))?
            }
            None => self.run_units_parallel(units)?,
        };
        stats.end_phase("per_unit");

        let mut sets = Vec::with_capacity(per_unit.len());
        for (set, unit_stats) in per_unit {
            stats.absorb(&unit_stats);
            sets.push(set);
        }

        stats.start_phase("cross_unit");
        let merged = self.merge_with_stats(sets, &mut stats);
        stats.end_phase("cross_unit");

        Ok(ProjectRun { units: merged, stats: stats.finalize() })
    }

    fn run_units_parallel(&self, units: &[TranslationUnit]) -> Result<Vec<(UnitSet, RunStats)>> {
        units.par_iter().map(|tu| self.run_unit_with_stats(tu)).collect()
    }

    fn fold(&self, index: GroupingIndex, carried: Vec<Diagnostic>, stats: &mut StatsCollector) -> UnitSet {
        stats.start_phase("resolve");
        let (buckets, rejected) = index.into_parts();
        stats.record_rejected(rejected.len());

        let mut emitter = Emitter::new(self.config.report_branch_duplicates);
        for diagnostic in carried {
            emitter.carry(diagnostic);
        }
        for rejection in rejected {
            emitter.reject(rejection);
        }

        for bucket in buckets {
            let profile = BucketProfile::of(&bucket);
            let classification = classify_profile(bucket.key.kind, &profile);
            stats.record_bucket(classification);
            let key = bucket.key.clone();
            let units = resolve(bucket, classification);
            emitter.accept(&key, classification, &profile, units);
        }

        let set = emitter.finish();
        stats.record_units(set.len(), set.conflicts().count());
        stats.end_phase("resolve");
        set
    }
}
