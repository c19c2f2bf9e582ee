//! Trial logger: one append-only CSV file per run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use neuroracer_core::TrialRecord;
use tracing::{debug, error};

use crate::error::EngineResult;

pub const LOG_HEADER: [&str; 4] = ["Timestamp", "Cue Type", "Button Pressed", "Reaction Time (ms)"];

/// Receives every completed trial of a run. Called from both the sequencer
/// and the input poller; implementations report their own failures.
pub trait TrialSink: Send + Sync {
    fn record(&self, record: &TrialRecord);
}

/// Creates the sink for a new run.
pub trait TrialSinkFactory: Send + Sync {
    fn open_run(&self, test_name: &str, output_dir: &Path, started: DateTime<Local>) -> Arc<dyn TrialSink>;
}

/// `<test name>_<yyyyMMdd_HHmmss>.csv`, with path separators in the name
/// replaced.
pub fn log_file_name(test_name: &str, started: DateTime<Local>) -> String {
    let safe: String = test_name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}_{}.csv", safe, started.format("%Y%m%d_%H%M%S"))
}

fn csv_row(record: &TrialRecord) -> [String; 4] {
    [
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.modality.label().to_string(),
        if record.pressed { "True" } else { "False" }.to_string(),
        record.reaction_time_ms.to_string(),
    ]
}

/// CSV trial log for a single run. The file and its header are created on the
/// first record.
pub struct CsvTrialLog {
    path: PathBuf,
    writer: Mutex<Option<csv::Writer<File>>>,
}

impl CsvTrialLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> EngineResult<csv::Writer<File>> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(LOG_HEADER)?;
        }
        Ok(writer)
    }

    fn append(&self, record: &TrialRecord) -> EngineResult<()> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(writer) = guard.as_mut() {
            writer.write_record(csv_row(record))?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl TrialSink for CsvTrialLog {
    fn record(&self, record: &TrialRecord) {
        match self.append(record) {
            Ok(()) => debug!("Trial logged to {}", self.path.display()),
            Err(e) => error!("Failed to write trial to {}: {}", self.path.display(), e),
        }
    }
}

/// Opens a fresh [`CsvTrialLog`] per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvJournal;

impl TrialSinkFactory for CsvJournal {
    fn open_run(&self, test_name: &str, output_dir: &Path, started: DateTime<Local>) -> Arc<dyn TrialSink> {
        Arc::new(CsvTrialLog::new(output_dir.join(log_file_name(test_name, started))))
    }
}

/// Keeps records in memory; useful for headless runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TrialRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<TrialRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TrialSink for MemorySink {
    fn record(&self, record: &TrialRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Hands the same [`MemorySink`] to every run.
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    pub sink: Arc<MemorySink>,
}

impl TrialSinkFactory for MemoryJournal {
    fn open_run(&self, _test_name: &str, _output_dir: &Path, _started: DateTime<Local>) -> Arc<dyn TrialSink> {
        self.sink.clone()
    }
}
