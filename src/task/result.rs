//! Task run records.

use std::time::Duration;

use crate::build::PipelineReport;

/// What a task action produced.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    /// Pipeline reports, one per pipeline the action ran
    pub reports: Vec<PipelineReport>,
}

impl TaskOutput {
    /// Output of an action that ran no pipeline.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Diagnostics across all reports.
    pub fn diagnostic_count(&self) -> usize {
        self.reports.iter().map(|r| r.diagnostics.len()).sum()
    }
}

impl From<PipelineReport> for TaskOutput {
    fn from(report: PipelineReport) -> Self {
        Self { reports: vec![report] }
    }
}

/// One task executed during an invocation.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub name: String,
    /// Time spent in the task's own action (dependencies excluded)
    pub duration: Duration,
    pub output: TaskOutput,
}

/// Everything that ran for one `invoke` call, in completion order.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Task that was invoked
    pub target: String,
    pub runs: Vec<TaskRun>,
    pub duration: Duration,
}

impl Invocation {
    /// Names of the tasks that ran, in order.
    pub fn order(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.name.as_str()).collect()
    }

    /// Check whether a task ran.
    pub fn ran(&self, name: &str) -> bool {
        self.runs.iter().any(|r| r.name == name)
    }

    /// All pipeline reports produced, in run order.
    pub fn reports(&self) -> impl Iterator<Item = &PipelineReport> {
        self.runs.iter().flat_map(|r| r.output.reports.iter())
    }

    /// Total number of diagnostics.
    pub fn diagnostic_count(&self) -> usize {
        self.runs.iter().map(|r| r.output.diagnostic_count()).sum()
    }
}
