use loadlab_common::Endpoint;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub requests_total: u64,
    pub successes: u64,
    /// Non-2xx responses and transport failures, excluding the expected 500s from `/error`.
    pub failures: u64,
    /// 500s from `/error`; the server injects these on purpose.
    pub expected_errors: u64,
    /// Requests per endpoint that got any HTTP response back.
    pub delivered: BTreeMap<Endpoint, u64>,
    /// One entry per completed operation, in insertion order (unsorted).
    pub latency_ns: Vec<u64>,
    pub elapsed_secs: f64,
}

impl Metrics {
    /// Fold another worker's metrics into this one. `elapsed_secs` is left untouched.
    pub fn merge(&mut self, other: Metrics) {
        self.requests_total += other.requests_total;
        self.successes += other.successes;
        self.failures += other.failures;
        self.expected_errors += other.expected_errors;
        for (endpoint, count) in other.delivered {
            *self.delivered.entry(endpoint).or_insert(0) += count;
        }
        self.latency_ns.extend(other.latency_ns);
    }

    pub fn p50_ns(&self) -> u64 {
        percentile(&self.latency_ns, 0.50)
    }

    pub fn p99_ns(&self) -> u64 {
        percentile(&self.latency_ns, 0.99)
    }

    pub fn mean_ns(&self) -> u64 {
        if self.latency_ns.is_empty() {
            return 0;
        }
        self.latency_ns.iter().sum::<u64>() / self.latency_ns.len() as u64
    }

    /// Fraction of requests that failed unexpectedly; 0 when nothing was sent.
    pub fn error_rate(&self) -> f64 {
        if self.requests_total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.requests_total as f64
    }

    pub fn throughput_rps(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.requests_total as f64 / self.elapsed_secs
    }
}

/// Sort `data` ascending and return the element at index `floor(p * n)`.
/// Returns 0 for an empty slice.
fn percentile(data: &[u64], p: f64) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
