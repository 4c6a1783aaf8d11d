use crate::naming::OutputPaths;
use crate::planner::LoopPlan;
use crate::transition::TransitionPlan;
use crate::types::{AudioTimeline, ClipSpec, TimeUs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One (clip, variant) render. Built during batch setup and consumed by a
/// single worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderJob {
    pub id: usize,
    pub clip: ClipSpec,
    /// 0-based index into the distribution plan.
    pub variant: usize,
    pub target: TimeUs,
    pub loop_plan: LoopPlan,
    pub timeline: AudioTimeline,
    pub transition: TransitionPlan,
    pub outputs: OutputPaths,
}

impl RenderJob {
    /// Short label for logs and progress, e.g. `beach_Part2_1h.mp4`.
    pub fn label(&self) -> String {
        self.outputs
            .video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("job {}", self.id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobState {
    Planned,
    Rendering,
    Succeeded,
    Failed(String),
    Skipped(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Skipped(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => f.write_str("planned"),
            Self::Rendering => f.write_str("rendering"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Terminal record of one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutcome {
    pub job_id: usize,
    pub clip: PathBuf,
    pub variant: usize,
    pub state: JobState,
    /// Engine attempts spent on the render step (0 when it never ran).
    pub attempts: u32,
    pub outputs: Option<OutputPaths>,
    /// Non-fatal notes such as a failed upload.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    /// One entry per job, in enumeration order.
    pub outcomes: Vec<JobOutcome>,
    /// Batch-level notices: unresolved songs, transition downgrades.
    pub warnings: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchResult {
    pub fn new(mut outcomes: Vec<JobOutcome>, warnings: Vec<String>) -> Self {
        outcomes.sort_by_key(|o| o.job_id);
        let count = |f: fn(&JobState) -> bool| outcomes.iter().filter(|o| f(&o.state)).count();
        let succeeded = count(|s| matches!(s, JobState::Succeeded));
        let failed = count(|s| matches!(s, JobState::Failed(_)));
        let skipped = count(|s| matches!(s, JobState::Skipped(_)));
        Self {
            outcomes,
            warnings,
            succeeded,
            failed,
            skipped,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.outcomes.len()
    }
}

/// Snapshot published while a batch runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    /// Label of the most recently started job.
    pub current: Option<String>,
}
