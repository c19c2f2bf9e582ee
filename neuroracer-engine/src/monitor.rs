//! Device monitor: periodic re-enumeration with hot-plug notifications.

use std::sync::Arc;
use std::time::Duration;

use neuroracer_core::DeviceSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::DeviceBackend;
use crate::events::{Notification, Notifier};
use crate::registry::DeviceRegistry;

pub struct DeviceMonitor {
    backend: Arc<dyn DeviceBackend>,
    registry: Arc<DeviceRegistry>,
    notifier: Notifier,
    period: Duration,
}

impl DeviceMonitor {
    pub fn new(
        backend: Arc<dyn DeviceBackend>,
        registry: Arc<DeviceRegistry>,
        notifier: Notifier,
        period: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            notifier,
            period,
        }
    }

    /// Re-enumerates once. Only a change in the number of attached devices
    /// replaces the set and is reported.
    pub fn check(&self) -> Option<DeviceSet> {
        let found = self.backend.enumerate();
        let set = self.registry.replace_if_count_changed(found)?;
        let names: Vec<&str> = set.iter().map(|d| d.display_name.as_str()).collect();
        self.notifier.info(format!(
            "Input devices changed: {} attached [{}]",
            set.len(),
            names.join(", ")
        ));
        self.notifier.send(Notification::DeviceSetChanged(set.clone()));
        Some(set)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check();
                }
            }
        }
        debug!("Device monitor stopped");
    }
}
