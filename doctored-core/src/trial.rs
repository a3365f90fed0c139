use crate::keys::Decision;
use crate::stimulus::StimulusKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-trial state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    /// Image is due on the next presented frame.
    Stimulus,
    /// Image is on screen and the response window is open.
    Response,
    Complete,
}

/// Classified participant response for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    /// Flagged as manipulated.
    Signal,
    /// Flagged as original.
    Noise,
    Timeout,
    /// A key was accepted that maps to neither category.
    Error,
}

impl Response {
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Reject => Response::Signal,
            Decision::Accept => Response::Noise,
            _ => Response::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Signal => "signal",
            Response::Noise => "noise",
            Response::Timeout => "timeout",
            Response::Error => "error",
        }
    }
}

/// One row of the trial results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub subject_id: Uuid,
    pub trial_id: usize,
    pub stimuli_type: StimulusKind,
    pub stimuli: String,
    pub response: Response,
    /// Seconds from stimulus onset to key press or timeout.
    pub reaction_time: f64,
}
