//! Schedule store: reads the ordered list of trial actions from a JSON
//! document of the form
//!
//! ```json
//! { "test_schedule": [
//!     { "wait": { "between": [ { "min": 2, "max": 4 }, { "min": 3, "max": 6 } ] } },
//!     { "audio_cue": true, "visual_cue": false }
//! ] }
//! ```
//!
//! Entries that cannot be understood are dropped with a warning; the rest keep
//! their source order, duplicates included.

use std::path::Path;
use std::sync::Arc;

use neuroracer_core::{CueModality, ScheduleAction, WaitRange};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::WaitBounds;
use crate::error::{EngineError, EngineResult};

#[derive(Deserialize)]
struct ScheduleDocument {
    test_schedule: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawEntry {
    wait: Option<RawWait>,
    #[serde(default)]
    audio_cue: bool,
    #[serde(default)]
    visual_cue: bool,
}

#[derive(Deserialize)]
struct RawWait {
    #[serde(default)]
    between: Vec<RawRange>,
}

#[derive(Deserialize)]
struct RawRange {
    min: Option<u32>,
    max: Option<u32>,
}

impl RawWait {
    fn resolve(&self, bounds: WaitBounds) -> Option<WaitRange> {
        match (bounds, self.between.as_slice()) {
            (_, []) => None,
            (_, [only]) => Some(WaitRange::new(only.min?, only.max?)),
            (WaitBounds::SplitRanges, [first, second, ..]) => {
                Some(WaitRange::new(first.min?, second.max?))
            }
            (WaitBounds::FirstRange, [first, ..]) => Some(WaitRange::new(first.min?, first.max?)),
        }
    }
}

/// Immutable, cheaply cloned sequence of actions for one or more runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    actions: Arc<[ScheduleAction]>,
}

impl Schedule {
    pub fn new(actions: Vec<ScheduleAction>) -> Self {
        Self {
            actions: actions.into(),
        }
    }

    /// Parses a schedule document. Only a document that is not valid JSON or
    /// lacks the `test_schedule` list is an error; bad entries are skipped.
    pub fn parse(text: &str, bounds: WaitBounds) -> EngineResult<Self> {
        let doc: ScheduleDocument = serde_json::from_str(text)?;
        let mut actions = Vec::with_capacity(doc.test_schedule.len());

        for (index, value) in doc.test_schedule.into_iter().enumerate() {
            let entry: RawEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Schedule entry {} is malformed ({}); skipping", index, e);
                    continue;
                }
            };

            if let Some(wait) = &entry.wait {
                match wait.resolve(bounds) {
                    Some(range) => actions.push(ScheduleAction::Wait(range)),
                    None => warn!(
                        "Schedule entry {} has no well-formed min/max pair; skipping",
                        index
                    ),
                }
                continue;
            }

            match CueModality::from_flags(entry.audio_cue, entry.visual_cue) {
                Some(modality) => actions.push(ScheduleAction::cue(modality)),
                None => warn!("Schedule entry {} is neither a wait nor a cue; skipping", index),
            }
        }

        Ok(Self::new(actions))
    }

    /// Loads a schedule file. Any failure yields an empty schedule.
    pub fn load(path: &Path, bounds: WaitBounds) -> Self {
        let loaded = std::fs::read_to_string(path)
            .map_err(EngineError::from)
            .and_then(|text| Self::parse(&text, bounds));
        match loaded {
            Ok(schedule) => {
                info!(
                    "Schedule loaded from {}: {} actions ({} cues)",
                    path.display(),
                    schedule.len(),
                    schedule.cue_count()
                );
                schedule
            }
            Err(e) => {
                error!("Failed to load schedule {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn actions(&self) -> &[ScheduleAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn cue_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_cue()).count()
    }
}
