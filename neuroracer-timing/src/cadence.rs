use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Summary of how regularly a periodic loop actually ticked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JitterStats {
    pub samples: usize,
    pub average_interval_ns: f64,
    pub jitter_ns: f64,
    pub min_interval_ns: f64,
    pub max_interval_ns: f64,
}

/// Records tick-to-tick intervals of a polling loop, keeping the most recent
/// `max_samples`.
#[derive(Debug, Clone)]
pub struct CadenceMeter {
    last: Option<Instant>,
    intervals: VecDeque<Duration>,
    max_samples: usize,
}

impl CadenceMeter {
    pub fn new(max_samples: usize) -> Self {
        Self {
            last: None,
            intervals: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last.replace(now) {
            if self.intervals.len() >= self.max_samples {
                self.intervals.pop_front();
            }
            self.intervals.push_back(now.saturating_duration_since(last));
        }
    }

    pub fn stats(&self) -> JitterStats {
        let times: Vec<f64> = self
            .intervals
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return JitterStats::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        JitterStats {
            samples: times.len(),
            average_interval_ns: avg,
            jitter_ns: var.sqrt(),
            min_interval_ns: min,
            max_interval_ns: max,
        }
    }
}

impl Default for CadenceMeter {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn steady_ticks_have_no_jitter() {
        let mut meter = CadenceMeter::new(16);
        for _ in 0..5 {
            meter.tick(Instant::now());
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        let stats = meter.stats();
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.average_interval_ns, 100_000_000.0);
        assert_eq!(stats.jitter_ns, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_only_recent_samples() {
        let mut meter = CadenceMeter::new(2);
        meter.tick(Instant::now());
        for ms in [10, 20, 30] {
            tokio::time::advance(Duration::from_millis(ms)).await;
            meter.tick(Instant::now());
        }
        let stats = meter.stats();
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.min_interval_ns, 20_000_000.0);
        assert_eq!(stats.max_interval_ns, 30_000_000.0);
    }

    #[test]
    fn empty_meter_reports_zeroes() {
        assert_eq!(CadenceMeter::default().stats(), JitterStats::default());
    }
}
