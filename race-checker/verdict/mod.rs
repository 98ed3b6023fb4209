//! Sweep classification
//!
//! A sweep is the list of outcomes for step counts `0, 1, 2, ...`. Whether
//! it proves the absence of a race depends on the fixture:
//!
//! - any `Weird` outcome fails;
//! - with the nudge written after the signal, the read can only complete if
//!   the signal was lost, so any `Normal` outcome fails;
//! - with the nudge written up front, outcomes must switch from
//!   `Interrupted` to `Normal` exactly once, at the point of no return.

use serde::{Deserialize, Serialize};

use crate::fixture::Nudge;
use crate::races::RunResult;

/// Result of classifying one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Every outcome was acceptable; `boundary` is the first `Normal` step
    Pass { boundary: Option<usize> },
    /// Wrong data, lost data, hang or crash at `step`
    Weird { step: usize },
    /// The signal at `step` did not stop the call from blocking
    LostInterrupt { step: usize },
    /// An interruption was reported at `step` after a completed run
    NotMonotone { step: usize },
    /// The sweep never reached a terminal step
    Inconclusive,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }
}

/// Classifies the outcomes of a sweep, indexed by step count
pub fn classify(nudge: Nudge, results: &[RunResult], reached_terminal: bool) -> Verdict {
    if let Some(step) = results.iter().position(|r| *r == RunResult::Weird) {
        return Verdict::Weird { step };
    }

    let first_normal = results.iter().position(|r| *r == RunResult::Normal);
    match (nudge, first_normal) {
        (Nudge::AfterSignal, Some(step)) => return Verdict::LostInterrupt { step },
        (Nudge::BeforeStart, Some(start)) => {
            if let Some(offset) = results[start..]
                .iter()
                .position(|r| *r == RunResult::Interrupted)
            {
                return Verdict::NotMonotone { step: start + offset };
            }
        }
        _ => {}
    }

    if !reached_terminal {
        return Verdict::Inconclusive;
    }
    Verdict::Pass {
        boundary: first_normal,
    }
}

/// Compact `IIINNN` rendering of a sweep
pub fn pattern(results: &[RunResult]) -> String {
    results.iter().map(|r| r.symbol()).collect()
}
