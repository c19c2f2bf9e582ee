//! The boundary with the UI layer: commands flow in, notifications flow out.

use std::path::PathBuf;
use std::time::Duration;

use neuroracer_core::DeviceSet;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::RunSummary;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    TogglePause,
    Pause,
    Resume,
    /// Device id or display name.
    SelectDevice(String),
    SelectButton(usize),
    LoadSchedule(PathBuf),
    SetOutputDirectory(PathBuf),
    SetTestName(String),
    BeginButtonDetection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Log(String),
    DeviceSetChanged(DeviceSet),
    /// Countdown position within the current action. `action` is the
    /// 1-based schedule position out of `actions`, or 0 between runs.
    Progress {
        fraction: f64,
        step: usize,
        total: usize,
        elapsed: Duration,
        action: usize,
        actions: usize,
    },
    RunFinished(RunSummary),
    ButtonDetected(usize),
}

/// Sends notifications to the UI layer. User-facing lines are traced as well
/// as forwarded. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.send(Notification::Log(message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.send(Notification::Log(message));
    }

    pub fn progress(
        &self,
        fraction: f64,
        step: usize,
        total: usize,
        elapsed: Duration,
        action: usize,
        actions: usize,
    ) {
        self.send(Notification::Progress {
            fraction,
            step,
            total,
            elapsed,
            action,
            actions,
        });
    }

    pub fn reset_progress(&self, total: usize, actions: usize) {
        self.progress(0.0, 0, total, Duration::ZERO, 0, actions);
    }
}
