use loadlab_common::{Endpoint, StatsResponse};
use std::collections::BTreeMap;

/// A server-side counter that disagrees with what the client observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The server counted fewer requests on `endpoint` than the client got responses for.
    LostUpdates { endpoint: String, delivered: u64, counted: u64 },
    /// `sum(requests_by_endpoint) != total_requests` in a single snapshot.
    EndpointSumMismatch { sum: u64, total: u64 },
    /// `error_count > total_requests` in a single snapshot.
    ErrorsExceedRequests { errors: u64, total: u64 },
    /// The server counted fewer errors than the injected failures the client saw.
    ErrorUndercount { observed: u64, counted: u64 },
    /// A counter went down between the two snapshots.
    CounterDecreased { counter: String, before: u64, after: u64 },
}

/// Compare the server's `/stats` before and after a run against the client's view of it.
///
/// Counts are compared as deltas and only flag undercounting, so other clients hitting the
/// same server cannot cause false positives.
pub fn check(
    before: &StatsResponse,
    after: &StatsResponse,
    delivered: &BTreeMap<Endpoint, u64>,
    expected_errors: u64,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for snapshot in [before, after] {
        let sum: u64 = snapshot.requests_by_endpoint.values().sum();
        if sum != snapshot.total_requests {
            violations.push(Violation::EndpointSumMismatch {
                sum,
                total: snapshot.total_requests,
            });
        }
        if snapshot.error_count > snapshot.total_requests {
            violations.push(Violation::ErrorsExceedRequests {
                errors: snapshot.error_count,
                total: snapshot.total_requests,
            });
        }
    }

    let mut monotonic = vec![
        ("total_requests".to_string(), before.total_requests, after.total_requests),
        ("error_count".to_string(), before.error_count, after.error_count),
    ];
    for (path, count) in &before.requests_by_endpoint {
        monotonic.push((path.clone(), *count, endpoint_count(after, path)));
    }
    for (counter, b, a) in monotonic {
        if a < b {
            violations.push(Violation::CounterDecreased {
                counter,
                before: b,
                after: a,
            });
        }
    }

    for (endpoint, sent) in delivered {
        let path = endpoint.path();
        let counted = endpoint_count(after, path).saturating_sub(endpoint_count(before, path));
        if counted < *sent {
            violations.push(Violation::LostUpdates {
                endpoint: path.to_string(),
                delivered: *sent,
                counted,
            });
        }
    }

    let counted_errors = after.error_count.saturating_sub(before.error_count);
    if counted_errors < expected_errors {
        violations.push(Violation::ErrorUndercount {
            observed: expected_errors,
            counted: counted_errors,
        });
    }

    violations
}

fn endpoint_count(stats: &StatsResponse, path: &str) -> u64 {
    stats.requests_by_endpoint.get(path).copied().unwrap_or(0)
}
