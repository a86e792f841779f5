use chrono::{DateTime, Utc};
use loadlab_common::{ProcessInfo, StatsResponse};

use crate::memory::MemorySample;
use crate::stats::StatsSnapshot;

/// Whole seconds elapsed between `start` and `now`; zero if the clock went backwards.
pub fn uptime_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - start).num_milliseconds().max(0) as u64 / 1000
}

/// Fractional seconds elapsed between `start` and `now`.
pub fn elapsed_secs(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// `"12.50%"`, or `"0%"` before any request has been counted.
pub fn format_error_rate(error_count: u64, total_requests: u64) -> String {
    if total_requests == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", error_count as f64 / total_requests as f64 * 100.0)
}

/// Requests per second with two decimals; `"0.00"` when no time has elapsed.
pub fn format_requests_per_second(total_requests: u64, elapsed_secs: f64) -> String {
    if elapsed_secs <= 0.0 {
        return "0.00".to_string();
    }
    let rate = total_requests as f64 / elapsed_secs;
    if !rate.is_finite() {
        return "0.00".to_string();
    }
    format!("{:.2}", rate)
}

/// Build the `/stats` body from a snapshot, the current time and a memory sample.
pub fn build(snapshot: &StatsSnapshot, now: DateTime<Utc>, memory: &MemorySample) -> StatsResponse {
    let uptime = uptime_seconds(snapshot.start_time, now);

    StatsResponse {
        uptime_seconds: uptime,
        total_requests: snapshot.total_requests,
        requests_by_endpoint: snapshot.requests_by_endpoint.clone(),
        error_count: snapshot.error_count,
        error_rate: format_error_rate(snapshot.error_count, snapshot.total_requests),
        requests_per_second: format_requests_per_second(
            snapshot.total_requests,
            elapsed_secs(snapshot.start_time, now),
        ),
        memory_usage: memory.usage_with_external(),
        process: ProcessInfo {
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            uptime_seconds: uptime,
        },
    }
}
