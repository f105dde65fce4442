//! Point-in-time sampling of host statistics.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use sysinfo::System;
use tracing::debug;

use pulse_model::Metric;

/// Captures a named set of readings from the host on every poll.
///
/// Carries no state between polls beyond the poll sequence counter and
/// the `sysinfo` refresh baseline (CPU utilization is computed against
/// the previous refresh).
pub struct Sampler {
    poll_count: AtomicI64,
    system: Mutex<System>,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            poll_count: AtomicI64::new(0),
            system: Mutex::new(System::new()),
        }
    }

    /// Number of polls taken so far.
    pub fn polls(&self) -> i64 {
        self.poll_count.load(Ordering::Relaxed)
    }

    /// Take one sample of the host.
    ///
    /// Memory and CPU gauges, load averages, uptime, a random jitter
    /// gauge, and the `PollCount` counter reported as a per-poll delta
    /// (the collector keeps the running total).
    pub fn sample(&self) -> Vec<Metric> {
        let seq = self.poll_count.fetch_add(1, Ordering::Relaxed) + 1;

        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_memory();
        sys.refresh_cpu_usage();

        let mut metrics = vec![
            Metric::gauge("TotalMemory", sys.total_memory() as f64),
            Metric::gauge("FreeMemory", sys.free_memory() as f64),
            Metric::gauge("AvailableMemory", sys.available_memory() as f64),
            Metric::gauge("UsedMemory", sys.used_memory() as f64),
            Metric::gauge("TotalSwap", sys.total_swap() as f64),
            Metric::gauge("UsedSwap", sys.used_swap() as f64),
        ];

        for (i, cpu) in sys.cpus().iter().enumerate() {
            metrics.push(Metric::gauge(
                format!("CpuUtilization{i}"),
                cpu.cpu_usage() as f64,
            ));
        }
        drop(sys);

        let load = System::load_average();
        metrics.push(Metric::gauge("LoadAverage1", load.one));
        metrics.push(Metric::gauge("LoadAverage5", load.five));
        metrics.push(Metric::gauge("LoadAverage15", load.fifteen));
        metrics.push(Metric::gauge("Uptime", System::uptime() as f64));

        metrics.push(Metric::gauge("RandomValue", rand::random::<f64>()));
        metrics.push(Metric::counter("PollCount", 1));

        debug!(seq, count = metrics.len(), "host sampled");
        metrics
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_model::MetricKind;

    #[test]
    fn sample_yields_valid_metrics() {
        let sampler = Sampler::new();
        for metric in sampler.sample() {
            metric.validate().unwrap();
        }
    }

    #[test]
    fn sample_increments_the_poll_counter() {
        let sampler = Sampler::new();
        assert_eq!(sampler.polls(), 0);

        sampler.sample();
        sampler.sample();
        assert_eq!(sampler.polls(), 2);
    }

    #[test]
    fn poll_count_is_a_per_poll_delta() {
        let sampler = Sampler::new();
        for _ in 0..3 {
            let metrics = sampler.sample();
            let poll = metrics.iter().find(|m| m.id == "PollCount").unwrap();
            assert_eq!(poll.kind, MetricKind::Counter);
            assert_eq!(poll.delta, Some(1));
        }
    }

    #[test]
    fn random_value_is_a_unit_interval_gauge() {
        let sampler = Sampler::new();
        let metrics = sampler.sample();
        let random = metrics.iter().find(|m| m.id == "RandomValue").unwrap();
        let value = random.value.unwrap();
        assert!((0.0..1.0).contains(&value));
    }

    #[test]
    fn memory_gauges_are_present() {
        let sampler = Sampler::new();
        let metrics = sampler.sample();
        for id in ["TotalMemory", "FreeMemory", "AvailableMemory", "UsedMemory"] {
            assert!(metrics.iter().any(|m| m.id == id), "missing {id}");
        }
    }
}
