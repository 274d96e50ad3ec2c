use protocol::Classification;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunStats {
    pub total_duration: Duration,
    pub phase_durations: HashMap<String, Duration>,
    pub translation_units: usize,
    pub records_seen: usize,
    pub records_rejected: usize,
    pub buckets: BTreeMap<Classification, usize>,
    pub units_emitted: usize,
    pub conflict_units: usize,
}

impl RunStats {
    pub fn bucket_count(&self, classification: Classification) -> usize {
        self.buckets.get(&classification).copied().unwrap_or(0)
    }

    /// Records folded away as duplicates of another occurrence.
    pub fn duplicates_folded(&self) -> usize {
        self.records_seen.saturating_sub(self.records_rejected).saturating_sub(self.units_emitted)
    }
}

#[derive(Debug)]
pub struct StatsCollector {
    start_time: Instant,
    phase_timers: HashMap<String, Instant>,
    phase_durations: HashMap<String, Duration>,
    translation_units: usize,
    records_seen: usize,
    records_rejected: usize,
    buckets: BTreeMap<Classification, usize>,
    units_emitted: usize,
    conflict_units: usize,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_timers: HashMap::new(),
            phase_durations: HashMap::new(),
            translation_units: 0,
            records_seen: 0,
            records_rejected: 0,
            buckets: BTreeMap::new(),
            units_emitted: 0,
            conflict_units: 0,
        }
    }

    pub fn start_phase(&mut self, phase: &str) {
        debug!("Starting phase: {}", phase);
        self.phase_timers.insert(phase.to_string(), Instant::now());
    }

    pub fn end_phase(&mut self, phase: &str) {
        if let Some(start_time) = self.phase_timers.remove(phase) {
            let duration = start_time.elapsed();
            *self.phase_durations.entry(phase.to_string()).or_default() += duration;
            debug!("Phase {} completed in {:?}", phase, duration);
        }
    }

    pub fn record_translation_unit(&mut self, records: usize) {
        self.translation_units += 1;
        self.records_seen += records;
    }

    pub fn record_rejected(&mut self, count: usize) {
        self.records_rejected += count;
    }

    pub fn record_bucket(&mut self, classification: Classification) {
        *self.buckets.entry(classification).or_default() += 1;
    }

    pub fn record_units(&mut self, emitted: usize, conflicts: usize) {
        self.units_emitted += emitted;
        self.conflict_units += conflicts;
    }

    /// Folds in the counters of a run executed elsewhere (e.g. a per-unit worker).
    pub fn absorb(&mut self, other: &RunStats) {
        self.translation_units += other.translation_units;
        self.records_seen += other.records_seen;
        self.records_rejected += other.records_rejected;
        for (phase, duration) in &other.phase_durations {
            *self.phase_durations.entry(phase.clone()).or_default() += *duration;
        }
    }

    pub fn finalize(self) -> RunStats {
        let stats = self.snapshot();
        Self::log_stats(&stats);
        stats
    }

    /// Like [`finalize`](Self::finalize) without the summary log.
    pub fn snapshot(self) -> RunStats {
        RunStats {
            total_duration: self.start_time.elapsed(),
            phase_durations: self.phase_durations,
            translation_units: self.translation_units,
            records_seen: self.records_seen,
            records_rejected: self.records_rejected,
            buckets: self.buckets,
            units_emitted: self.units_emitted,
            conflict_units: self.conflict_units,
        }
    }

    fn log_stats(stats: &RunStats) {
        info!("Merge summary:");
        info!("  Total duration: {:?}", stats.total_duration);
        for (phase, duration) in &stats.phase_durations {
            info!("    {}: {:?}", phase, duration);
        }
        info!("  Translation units: {}", stats.translation_units);
        info!("  Records: {} seen, {} rejected", stats.records_seen, stats.records_rejected);
        for (classification, count) in &stats.buckets {
            info!("    {}: {}", classification, count);
        }
        info!("  Units: {} emitted, {} in unresolved conflict", stats.units_emitted, stats.conflict_units);
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
