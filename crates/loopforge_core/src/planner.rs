//! Loop/trim planning for stretching a short clip to an exact target length.
//!
//! The plan always repeats content; it never changes playback speed.

use crate::error::{CoreError, Result};
use crate::types::TimeUs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoopPlan {
    pub source: TimeUs,
    pub target: TimeUs,
    /// Complete plays of the source.
    pub full_loops: u64,
    /// Length of the partial segment (taken from the start of the source)
    /// appended after the full loops. Always `< source`.
    pub remainder: TimeUs,
}

impl LoopPlan {
    /// Total duration the plan reconstructs to.
    pub fn total(&self) -> TimeUs {
        self.source * self.full_loops as i64 + self.remainder
    }

    /// `true` when the target is shorter than one play of the source.
    pub fn is_trim(&self) -> bool {
        self.full_loops == 0
    }

    /// Extra plays of the input beyond the first, as ffmpeg's `-stream_loop`
    /// expects. The engine trims the last play to the target.
    pub fn input_repeats(&self) -> u64 {
        if self.remainder.is_positive() {
            self.full_loops
        } else {
            self.full_loops.saturating_sub(1)
        }
    }
}

/// Plan how `source` must be looped and trimmed to last exactly `target`.
pub fn plan_loops(source: TimeUs, target: TimeUs) -> Result<LoopPlan> {
    if !source.is_positive() {
        return Err(CoreError::InvalidDuration(format!(
            "source duration must be positive, got {source}"
        )));
    }
    if !target.is_positive() {
        return Err(CoreError::InvalidDuration(format!(
            "target duration must be positive, got {target}"
        )));
    }

    let full_loops = (target.0 / source.0) as u64;
    let remainder = TimeUs(target.0 % source.0);

    Ok(LoopPlan {
        source,
        target,
        full_loops,
        remainder,
    })
}
