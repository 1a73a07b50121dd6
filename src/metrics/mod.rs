// Metrics module - Host CPU and network sampling with a bounded history

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use sysinfo::{Networks, System};
use tokio::sync::RwLock;

/// One raw host sample. Network counters are cumulative since boot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub at: SystemTime,
    pub cpu_percent: f32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A sample ready for display, network counters turned into per-interval deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsPoint {
    pub at: SystemTime,
    pub cpu_percent: f32,
    /// `None` for the oldest retained sample
    pub sent_delta: Option<u64>,
    pub received_delta: Option<u64>,
}

/// Rolling window of host samples
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    samples: VecDeque<MetricsSample>,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, dropping the oldest once full
    pub fn push(&mut self, sample: MetricsSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every retained sample as display points, oldest first
    pub fn points(&self) -> Vec<MetricsPoint> {
        let mut previous: Option<&MetricsSample> = None;

        self.samples
            .iter()
            .map(|sample| {
                // A counter that went backwards (interface reset) reads as no traffic
                let point = MetricsPoint {
                    at: sample.at,
                    cpu_percent: sample.cpu_percent,
                    sent_delta: previous.map(|p| sample.bytes_sent.saturating_sub(p.bytes_sent)),
                    received_delta: previous
                        .map(|p| sample.bytes_received.saturating_sub(p.bytes_received)),
                };
                previous = Some(sample);
                point
            })
            .collect()
    }

    /// The most recent `count` display points
    pub fn last_points(&self, count: usize) -> Vec<MetricsPoint> {
        let points = self.points();
        let skip = points.len().saturating_sub(count);
        points.into_iter().skip(skip).collect()
    }
}

/// Reads host-wide CPU utilization and network byte counters through sysinfo
pub struct HostSampler {
    system: System,
    networks: Networks,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is computed between two refreshes, prime the first one
        system.refresh_cpu_usage();

        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    pub fn sample(&mut self) -> MetricsSample {
        self.system.refresh_cpu_usage();
        self.networks.refresh();

        let (bytes_sent, bytes_received) = self
            .networks
            .list()
            .values()
            .fold((0u64, 0u64), |(sent, received), data| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    received.saturating_add(data.total_received()),
                )
            });

        MetricsSample {
            at: SystemTime::now(),
            cpu_percent: self.system.global_cpu_usage().clamp(0.0, 100.0),
            bytes_sent,
            bytes_received,
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample the host on a fixed cadence into `history`, forever
pub async fn sample_loop(history: Arc<RwLock<MetricsHistory>>, interval: Duration) {
    let mut sampler = HostSampler::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let sample = sampler.sample();
        tracing::trace!(
            cpu = sample.cpu_percent,
            sent = sample.bytes_sent,
            received = sample.bytes_received,
            "Host sample"
        );
        history.write().await.push(sample);
    }
}
