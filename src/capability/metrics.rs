// ABOUTME: Per-capability request metrics
// ABOUTME: Counts attempts and maintains an incremental rolling average latency

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CapabilityError;

/// Counters for one capability instance. Only mutated while the owning
/// handle's invocation lock is held, so no interior synchronization here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_execution_time: Duration,
    pub last_error: Option<String>,
}

impl CapabilityMetrics {
    pub fn record_success(&mut self, elapsed: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.roll_average(elapsed);
    }

    pub fn record_failure(&mut self, elapsed: Duration, error: &CapabilityError) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_error = Some(error.to_string());
        self.roll_average(elapsed);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }

    // avg_n = avg_{n-1} + (x - avg_{n-1}) / n
    fn roll_average(&mut self, elapsed: Duration) {
        let n = self.total_requests as f64;
        let prev = self.avg_execution_time.as_secs_f64();
        let next = prev + (elapsed.as_secs_f64() - prev) / n;
        self.avg_execution_time = Duration::from_secs_f64(next.max(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average_is_incremental_mean() {
        let mut metrics = CapabilityMetrics::default();
        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(300));

        assert_eq!(metrics.total_requests, 2);
        let avg_ms = metrics.avg_execution_time.as_secs_f64() * 1000.0;
        assert!((avg_ms - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_failure_records_last_error() {
        let mut metrics = CapabilityMetrics::default();
        let err = CapabilityError::Transient("timeout".into());
        metrics.record_failure(Duration::from_millis(50), &err);

        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.successful_requests, 0);
        assert!(metrics.last_error.as_ref().unwrap().contains("timeout"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut metrics = CapabilityMetrics::default();
        metrics.record_success(Duration::from_millis(10));
        metrics.record_failure(
            Duration::from_millis(10),
            &CapabilityError::Internal("x".into()),
        );

        metrics.reset();
        assert_eq!(metrics.total_requests, 0);
        assert!(metrics.last_error.is_none());
        assert_eq!(metrics.avg_execution_time, Duration::ZERO);
    }

    #[test]
    fn test_success_rate() {
        let mut metrics = CapabilityMetrics::default();
        assert_eq!(metrics.success_rate(), 0.0);

        metrics.record_success(Duration::ZERO);
        metrics.record_failure(Duration::ZERO, &CapabilityError::Internal("x".into()));
        assert!((metrics.success_rate() - 50.0).abs() < f64::EPSILON);
    }
}
