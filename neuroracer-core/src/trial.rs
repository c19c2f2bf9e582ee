use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::cue::CueModality;

/// Reaction time written for a cue that received no press.
pub const MISSED_REACTION_MS: f64 = -1.0;

/// Recorded outcome of one cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub timestamp: DateTime<Local>,
    pub modality: CueModality,
    pub pressed: bool,
    pub reaction_time_ms: f64,
}

impl TrialRecord {
    pub fn pressed(modality: CueModality, reaction: Duration) -> Self {
        Self {
            timestamp: Local::now(),
            modality,
            pressed: true,
            reaction_time_ms: reaction.as_nanos() as f64 / 1_000_000.0,
        }
    }

    pub fn missed(modality: CueModality) -> Self {
        Self {
            timestamp: Local::now(),
            modality,
            pressed: false,
            reaction_time_ms: MISSED_REACTION_MS,
        }
    }

    pub fn is_miss(&self) -> bool {
        !self.pressed
    }
}
