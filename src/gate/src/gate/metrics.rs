//! Check counters for gate observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time view of gate counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Rule evaluations
    pub total_checks: u64,

    /// Evaluations that returned an allowed verdict
    pub allowed_decisions: u64,

    /// Evaluations that returned a denied verdict
    pub denied_decisions: u64,

    /// Lookups for unregistered paths
    pub not_found: u64,

    /// Denials raised by `authorize`
    pub authorization_failures: u64,

    /// Cumulative time spent inside rules
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Fraction of evaluations that were allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }

    /// Mean rule latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / self.total_checks as f64 / 1000.0
        }
    }
}

/// Lock-free gate counters
#[derive(Debug, Default)]
pub struct GateMetrics {
    total_checks: AtomicU64,
    allowed_decisions: AtomicU64,
    denied_decisions: AtomicU64,
    not_found: AtomicU64,
    authorization_failures: AtomicU64,
    total_latency_us: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one rule evaluation
    pub fn record_decision(&self, allowed: bool, latency: Duration) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.allowed_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied_decisions.fetch_add(1, Ordering::Relaxed);
        }

        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authorization_failure(&self) {
        self.authorization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed_decisions: self.allowed_decisions.load(Ordering::Relaxed),
            denied_decisions: self.denied_decisions.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            authorization_failures: self.authorization_failures.load(Ordering::Relaxed),
            total_latency_us: self.total_latency_us.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.total_checks,
            &self.allowed_decisions,
            &self.denied_decisions,
            &self.not_found,
            &self.authorization_failures,
            &self.total_latency_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
