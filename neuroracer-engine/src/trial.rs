use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use neuroracer_core::{CueModality, TrialRecord};
use tokio::time::Instant;

use crate::logger::TrialSink;

/// The cue whose response window is currently open.
///
/// `logged` flips from false to true exactly once. Whoever flips it, the
/// poller on a press or the sequencer when the window closes, owns the cue's
/// single trial record.
pub struct ActiveCue {
    pub index: usize,
    pub modality: CueModality,
    pub started: Instant,
    logged: AtomicBool,
    sink: Arc<dyn TrialSink>,
}

impl ActiveCue {
    pub fn new(index: usize, modality: CueModality, started: Instant, sink: Arc<dyn TrialSink>) -> Self {
        Self {
            index,
            modality,
            started,
            logged: AtomicBool::new(false),
            sink,
        }
    }

    pub fn is_logged(&self) -> bool {
        self.logged.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.logged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Records a press at `at`. Returns the record if this call won the cue.
    pub fn respond(&self, at: Instant) -> Option<TrialRecord> {
        if !self.claim() {
            return None;
        }
        let record = TrialRecord::pressed(self.modality, at.saturating_duration_since(self.started));
        self.sink.record(&record);
        Some(record)
    }

    /// Records a miss. Returns the record if no press claimed the cue first.
    pub fn expire(&self) -> Option<TrialRecord> {
        if !self.claim() {
            return None;
        }
        let record = TrialRecord::missed(self.modality);
        self.sink.record(&record);
        Some(record)
    }
}

impl std::fmt::Debug for ActiveCue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveCue")
            .field("index", &self.index)
            .field("modality", &self.modality)
            .field("started", &self.started)
            .field("logged", &self.is_logged())
            .finish()
    }
}

/// Holds at most one open cue window, shared between the sequencer and the
/// input poller.
#[derive(Debug, Default)]
pub struct CueSlot {
    current: RwLock<Option<Arc<ActiveCue>>>,
}

impl CueSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a window, replacing any previous one.
    pub fn open(&self, cue: Arc<ActiveCue>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(cue);
    }

    pub fn close(&self) -> Option<Arc<ActiveCue>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn current(&self) -> Option<Arc<ActiveCue>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_open(&self) -> bool {
        self.current().is_some()
    }
}
