use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for per-translation-unit passes; `None` uses the global pool.
    pub jobs: Option<usize>,
    /// Emit a note for every bucket classified as a branch duplicate.
    pub report_branch_duplicates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { jobs: None, report_branch_duplicates: true }
    }
}

impl EngineConfig {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs.max(1));
        self
    }

    pub fn without_branch_notes(mut self) -> Self {
        self.report_branch_duplicates = false;
        self
    }
}
