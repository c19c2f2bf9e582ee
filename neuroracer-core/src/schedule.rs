use serde::{Deserialize, Serialize};

use crate::cue::CueModality;

/// Inclusive range of whole seconds a wait may last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRange {
    pub min_secs: u32,
    pub max_secs: u32,
}

impl WaitRange {
    pub fn new(min_secs: u32, max_secs: u32) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn is_valid(&self) -> bool {
        self.min_secs <= self.max_secs
    }
}

/// One step of a trial schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleAction {
    Wait(WaitRange),
    Cue { modality: CueModality },
}

impl ScheduleAction {
    pub fn wait(min_secs: u32, max_secs: u32) -> Self {
        Self::Wait(WaitRange::new(min_secs, max_secs))
    }

    pub fn cue(modality: CueModality) -> Self {
        Self::Cue { modality }
    }

    pub fn is_cue(&self) -> bool {
        matches!(self, Self::Cue { .. })
    }
}

impl std::fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait(range) => write!(f, "wait {}..={}s", range.min_secs, range.max_secs),
            Self::Cue { modality } => write!(f, "{} cue", modality),
        }
    }
}
