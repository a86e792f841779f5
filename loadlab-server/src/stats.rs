use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Point-in-time read of every aggregate counter.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub error_count: u64,
    pub start_time: DateTime<Utc>,
}

#[derive(Default)]
struct Counters {
    total_requests: u64,
    requests_by_endpoint: HashMap<String, u64>,
    error_count: u64,
}

/// Process-wide traffic counters shared by every request handler.
///
/// All counters sit behind one mutex, so a single update is applied as a unit and a snapshot
/// never sees `total_requests` without the matching endpoint increment. The critical sections
/// are a handful of integer operations and never await.
pub struct StatsAggregator {
    start_time: DateTime<Utc>,
    counters: Mutex<Counters>,
}

impl StatsAggregator {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self { start_time, counters: Mutex::new(Counters::default()) }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Count one inbound request against `endpoint`.
    pub fn record_request(&self, endpoint: &str) {
        let mut counters = self.counters.lock();
        counters.total_requests += 1;
        match counters.requests_by_endpoint.get_mut(endpoint) {
            Some(count) => *count += 1,
            None => {
                counters.requests_by_endpoint.insert(endpoint.to_string(), 1);
            }
        }
    }

    /// Count one error-class result.
    pub fn record_error(&self) {
        self.counters.lock().error_count += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters.lock();
        StatsSnapshot {
            total_requests: counters.total_requests,
            requests_by_endpoint: counters
                .requests_by_endpoint
                .iter()
                .map(|(path, count)| (path.clone(), *count))
                .collect(),
            error_count: counters.error_count,
            start_time: self.start_time,
        }
    }
}
