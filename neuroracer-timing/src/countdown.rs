use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Lets a countdown suspend while its owner is paused.
pub trait PauseGate: Send {
    /// Resolves once the countdown may continue. `false` means the owner is
    /// shutting down and the countdown should give up.
    fn proceed(&mut self) -> impl Future<Output = bool> + Send;
}

/// One progress step of a countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownTick {
    pub step: u32,
    pub steps: u32,
    pub elapsed: Duration,
}

impl CountdownTick {
    pub fn fraction(&self) -> f64 {
        if self.steps == 0 {
            1.0
        } else {
            self.step as f64 / self.steps as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Completed,
    Interrupted { at_step: u32 },
}

impl CountdownOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A duration split into evenly spaced progress ticks, `0..=steps`.
///
/// The gate is consulted before every tick, so a pause holds the countdown at
/// the step it reached and a resume continues from that step. Cancellation is
/// observed within one tick interval.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    total: Duration,
    steps: u32,
}

impl Countdown {
    pub fn new(total: Duration, steps: u32) -> Self {
        Self {
            total,
            steps: steps.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.total / self.steps
    }

    pub async fn run<G, F>(
        &self,
        gate: &mut G,
        cancel: &CancellationToken,
        mut on_tick: F,
    ) -> CountdownOutcome
    where
        G: PauseGate,
        F: FnMut(CountdownTick),
    {
        let interval = self.interval();
        for step in 0..=self.steps {
            let proceed = tokio::select! {
                proceed = gate.proceed() => proceed,
                _ = cancel.cancelled() => false,
            };
            if !proceed || cancel.is_cancelled() {
                return CountdownOutcome::Interrupted { at_step: step };
            }

            on_tick(CountdownTick {
                step,
                steps: self.steps,
                elapsed: interval * step,
            });

            if step == self.steps {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    return CountdownOutcome::Interrupted { at_step: step };
                }
            }
        }
        CountdownOutcome::Completed
    }
}
