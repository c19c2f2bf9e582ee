//! Input poller: samples the selected device at a fixed period, debounces
//! button transitions, and attributes presses to the open cue window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use neuroracer_timing::CadenceMeter;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{ButtonSnapshot, DeviceBackend, InputDevice};
use crate::events::{Notification, Notifier};
use crate::registry::{DeviceRegistry, Selection};
use crate::trial::CueSlot;

/// Turns successive snapshots into rising edges. The first snapshot only
/// primes the state, so a button held while a device is opened is
/// not reported as a press.
#[derive(Debug, Default)]
pub struct Debouncer {
    previous: Option<ButtonSnapshot>,
}

impl Debouncer {
    pub fn update(&mut self, snapshot: ButtonSnapshot) -> Vec<usize> {
        let edges = match &self.previous {
            Some(previous) => snapshot.rising_edges(previous),
            None => Vec::new(),
        };
        self.previous = Some(snapshot);
        edges
    }
}

/// One-shot request to report the next button pressed.
#[derive(Debug, Default)]
pub struct ButtonDetector {
    armed: AtomicBool,
}

impl ButtonDetector {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }
}

struct OpenDevice {
    device: Box<dyn InputDevice>,
    debouncer: Debouncer,
}

pub struct InputPoller {
    backend: Arc<dyn DeviceBackend>,
    registry: Arc<DeviceRegistry>,
    cues: Arc<CueSlot>,
    detector: Arc<ButtonDetector>,
    notifier: Notifier,
    period: Duration,
    retry: Duration,
}

impl InputPoller {
    pub fn new(
        backend: Arc<dyn DeviceBackend>,
        registry: Arc<DeviceRegistry>,
        cues: Arc<CueSlot>,
        detector: Arc<ButtonDetector>,
        notifier: Notifier,
        period: Duration,
        retry: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            cues,
            detector,
            notifier,
            period,
            retry,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut selection_rx = self.registry.subscribe_selection();
        let mut devices_rx = self.registry.subscribe_devices();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut meter = CadenceMeter::default();
        let mut open: Option<OpenDevice> = None;
        // Earliest instant another open may be attempted after a failure.
        let mut retry_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            meter.tick(Instant::now());

            let devices_changed = devices_rx.has_changed().unwrap_or(false);
            let selection_changed = selection_rx.has_changed().unwrap_or(false);
            if devices_changed || selection_changed {
                devices_rx.borrow_and_update();
                retry_at = None;
            }
            let selection = selection_rx.borrow_and_update().clone();
            self.tick(&mut open, &mut retry_at, &selection);
        }

        if let Some(open) = open.take() {
            info!("Released input device {}", open.device.descriptor().display_name);
        }
        let stats = meter.stats();
        debug!(
            "Poll cadence: {} samples, mean {:.3} ms, jitter {:.3} ms, min {:.3} ms, max {:.3} ms",
            stats.samples,
            stats.average_interval_ns / 1e6,
            stats.jitter_ns / 1e6,
            stats.min_interval_ns / 1e6,
            stats.max_interval_ns / 1e6,
        );
    }

    fn tick(
        &self,
        open: &mut Option<OpenDevice>,
        retry_at: &mut Option<Instant>,
        selection: &Selection,
    ) {
        let Some(wanted) = selection.device.as_ref() else {
            if let Some(old) = open.take() {
                info!("Released input device {}", old.device.descriptor().display_name);
            }
            return;
        };

        if open
            .as_ref()
            .is_some_and(|o| o.device.descriptor().id != wanted.id)
        {
            *open = None;
        }

        if open.is_none() {
            let now = Instant::now();
            if retry_at.is_some_and(|at| now < at) {
                return;
            }
            match self.backend.open(wanted) {
                Ok(device) => {
                    info!("Polling input device {}", wanted.display_name);
                    *retry_at = None;
                    *open = Some(OpenDevice {
                        device,
                        debouncer: Debouncer::default(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Cannot open input device {}: {}; retrying in {:?}",
                        wanted.display_name, e, self.retry
                    );
                    *retry_at = Some(now + self.retry);
                    return;
                }
            }
        }

        let Some(current) = open.as_mut() else {
            return;
        };
        let snapshot = match current.device.poll() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.notifier.warn(format!("Input device lost: {}", e));
                *open = None;
                *retry_at = Some(Instant::now() + self.retry);
                return;
            }
        };

        let edges = current.debouncer.update(snapshot);
        let Some(&first) = edges.first() else {
            return;
        };
        let now = Instant::now();

        if self.detector.take() {
            self.report_detected(first);
        }
        if edges.contains(&selection.button) {
            self.on_press(selection.button, now);
        }
    }

    fn report_detected(&self, index: usize) {
        match self.registry.select_button(index) {
            Ok(_) => {
                self.notifier.info(format!("Detected button press: Button {}", index));
                self.notifier.send(Notification::ButtonDetected(index));
            }
            Err(e) => self.notifier.warn(format!("Detected button rejected: {}", e)),
        }
    }

    fn on_press(&self, button: usize, at: Instant) {
        match self.cues.current() {
            Some(cue) => match cue.respond(at) {
                Some(record) => self.notifier.info(format!(
                    "Button {} pressed - {} cue, reaction time {:.1} ms",
                    button, record.modality, record.reaction_time_ms
                )),
                None => debug!("Button {} pressed; cue {} already logged", button, cue.index),
            },
            None => self
                .notifier
                .info(format!("Button {} pressed - no active cue", button)),
        }
    }
}
