//! Run state and the sequencer that walks a schedule.

use std::sync::Arc;
use std::time::Duration;

use neuroracer_core::{CueModality, RunState, ScheduleAction, WaitRange};
use neuroracer_timing::{Countdown, CountdownTick, PauseGate};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::CueSink;
use crate::events::{Notification, Notifier};
use crate::logger::TrialSink;
use crate::schedule::Schedule;
use crate::trial::{ActiveCue, CueSlot};

/// Owner of the current [`RunState`]. Commands write it, the sequencer's
/// gate reads it.
#[derive(Debug)]
pub struct RunControl {
    state: watch::Sender<RunState>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(RunState::Idle),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn gate(&self) -> RunGate {
        RunGate {
            rx: self.state.subscribe(),
        }
    }

    fn apply(&self, transition: impl FnOnce(&RunState) -> Option<RunState>) -> Option<RunState> {
        let mut applied = None;
        self.state.send_if_modified(|state| match transition(&*state) {
            Some(next) => {
                *state = next;
                applied = Some(next);
                true
            }
            None => false,
        });
        applied
    }

    /// `Idle|Finished -> Running`. Returns false if a run is already underway.
    pub fn begin(&self) -> bool {
        self.apply(|s| s.can_start().then_some(RunState::Running))
            .is_some()
    }

    pub fn pause(&self) -> Option<RunState> {
        self.apply(RunState::pause)
    }

    pub fn resume(&self) -> Option<RunState> {
        self.apply(RunState::resume)
    }

    pub fn toggle_pause(&self) -> Option<RunState> {
        self.apply(RunState::toggle_pause)
    }

    pub fn stop(&self) -> Option<RunState> {
        self.apply(RunState::stop)
    }

    /// Moves to the resting state a walk lands in once it has exited.
    pub fn settle(&self) -> RunState {
        let mut settled = RunState::Idle;
        self.state.send_modify(|state| {
            *state = state.settle();
            settled = *state;
        });
        settled
    }
}

/// Holds a countdown while the run is paused and releases it with `false`
/// once a stop has been requested.
#[derive(Debug, Clone)]
pub struct RunGate {
    rx: watch::Receiver<RunState>,
}

impl PauseGate for RunGate {
    async fn proceed(&mut self) -> bool {
        match self.rx.wait_for(|state| !state.is_paused()).await {
            Ok(state) => !state.is_stopping(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub cues: usize,
    pub skipped: usize,
    pub stopped: bool,
}

/// Walks one schedule from the first action to the last, or until stopped.
pub struct Sequencer<R> {
    schedule: Schedule,
    control: Arc<RunControl>,
    cues: Arc<CueSlot>,
    dispatcher: Arc<dyn CueSink>,
    notifier: Notifier,
    exposure: Duration,
    steps: u32,
    rng: R,
}

impl<R: Rng + Send> Sequencer<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schedule: Schedule,
        control: Arc<RunControl>,
        cues: Arc<CueSlot>,
        dispatcher: Arc<dyn CueSink>,
        notifier: Notifier,
        exposure: Duration,
        steps: u32,
        rng: R,
    ) -> Self {
        Self {
            schedule,
            control,
            cues,
            dispatcher,
            notifier,
            exposure,
            steps: steps.max(1),
            rng,
        }
    }

    /// Runs the walk to completion. The run state must already be `Running`;
    /// on exit it is settled to `Finished` (end of schedule) or `Idle`
    /// (stopped), progress is reset and `RunFinished` is emitted.
    pub async fn run(mut self, sink: Arc<dyn TrialSink>, cancel: CancellationToken) -> RunSummary {
        let actions = self.schedule.actions().to_vec();
        let count = actions.len();
        let mut gate = self.control.gate();
        let mut summary = RunSummary::default();
        self.notifier.reset_progress(self.steps as usize, count);
        self.notifier.info(format!(
            "Run started: {} actions, {} cues",
            count,
            self.schedule.cue_count()
        ));

        for (index, action) in actions.into_iter().enumerate() {
            if !proceed(&mut gate, &cancel).await {
                summary.stopped = true;
                break;
            }
            debug!("Action {}: {}", index, action);
            let position = Position {
                action: index + 1,
                actions: count,
            };
            let completed = match action {
                ScheduleAction::Wait(range) if !range.is_valid() => {
                    self.notifier.warn(format!(
                        "Skipping wait {}: minimum {} s exceeds maximum {} s",
                        index, range.min_secs, range.max_secs
                    ));
                    summary.skipped += 1;
                    continue;
                }
                ScheduleAction::Wait(range) => self.wait(range, position, &mut gate, &cancel).await,
                ScheduleAction::Cue { modality } => {
                    summary.cues += 1;
                    self.cue(index, position, modality, &sink, &mut gate, &cancel)
                        .await
                }
            };
            summary.executed += 1;
            if !completed {
                summary.stopped = true;
                break;
            }
        }

        let settled = self.control.settle();
        self.notifier.reset_progress(self.steps as usize, count);
        if summary.stopped {
            self.notifier.info(format!(
                "Run stopped after {} actions ({} cues)",
                summary.executed, summary.cues
            ));
        } else {
            self.notifier.info(format!(
                "Run finished: {} actions, {} cues, {} skipped",
                summary.executed, summary.cues, summary.skipped
            ));
        }
        debug!("Run state settled to {}", settled);
        self.notifier.send(Notification::RunFinished(summary.clone()));
        summary
    }

    async fn wait(
        &mut self,
        range: WaitRange,
        position: Position,
        gate: &mut RunGate,
        cancel: &CancellationToken,
    ) -> bool {
        let secs = self.rng.random_range(range.min_secs..=range.max_secs);
        self.notifier.info(format!("Waiting {} s", secs));
        let countdown = Countdown::new(Duration::from_secs(secs.into()), self.steps);
        let notifier = &self.notifier;
        countdown
            .run(gate, cancel, |tick| report(notifier, position, tick))
            .await
            .is_completed()
    }

    async fn cue(
        &self,
        index: usize,
        position: Position,
        modality: CueModality,
        sink: &Arc<dyn TrialSink>,
        gate: &mut RunGate,
        cancel: &CancellationToken,
    ) -> bool {
        let cue = Arc::new(ActiveCue::new(index, modality, Instant::now(), Arc::clone(sink)));
        self.cues.open(Arc::clone(&cue));
        self.notifier.info(format!("{} cue", modality));
        if let Some(payload) = self.dispatcher.dispatch(modality) {
            self.notifier.info(format!("Sent command: {}", payload));
        }

        let notifier = &self.notifier;
        let outcome = Countdown::new(self.exposure, self.steps)
            .run(gate, cancel, |tick| report(notifier, position, tick))
            .await;

        self.cues.close();
        if cue.expire().is_some() {
            self.notifier.info(format!("{} cue missed", modality));
        }
        outcome.is_completed()
    }
}

async fn proceed(gate: &mut RunGate, cancel: &CancellationToken) -> bool {
    tokio::select! {
        proceed = gate.proceed() => proceed && !cancel.is_cancelled(),
        _ = cancel.cancelled() => false,
    }
}

/// Schedule position of the action being executed.
#[derive(Debug, Clone, Copy)]
struct Position {
    action: usize,
    actions: usize,
}

fn report(notifier: &Notifier, position: Position, tick: CountdownTick) {
    notifier.progress(
        tick.fraction(),
        tick.step as usize,
        tick.steps as usize,
        tick.elapsed,
        position.action,
        position.actions,
    );
}
