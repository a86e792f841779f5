use loadlab_client::{Client, ClientConfig};
use loadlab_common::{Endpoint, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::Metrics;
use crate::workload::WorkloadProfile;

/// When a run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Send exactly this many requests, split across workers.
    Requests(u64),
    /// Keep sending until the deadline.
    Duration(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct RunPlan {
    pub concurrency: usize,
    pub mode: RunMode,
    /// Pause between requests for a random duration from the profile's think-time range.
    pub think: bool,
}

/// Live counters read by the progress printer while the run is in flight.
#[derive(Debug, Default)]
pub struct Progress {
    pub sent: AtomicU64,
    pub failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A 500 from `/error`.
    ExpectedError,
    Failure,
}

/// Split `total` requests over `workers`; the first `total % workers` workers take one extra.
pub fn split_requests(total: u64, workers: usize) -> Vec<u64> {
    if workers == 0 {
        return Vec::new();
    }
    let per_worker = total / workers as u64;
    let remainder = (total % workers as u64) as usize;
    (0..workers)
        .map(|i| per_worker + u64::from(i < remainder))
        .collect()
}

/// Classify the result of one hit.
pub fn classify(endpoint: Endpoint, result: &Result<u16>) -> Outcome {
    match result {
        Ok(status) if (200..300).contains(status) => Outcome::Success,
        Ok(500) if endpoint == Endpoint::Error => Outcome::ExpectedError,
        _ => Outcome::Failure,
    }
}

/// Drive the server at `base_url` with `profile` according to `plan`.
/// Returns the merged metrics of every worker.
pub async fn run(
    base_url: String,
    profile: WorkloadProfile,
    plan: RunPlan,
    progress: Arc<Progress>,
) -> Metrics {
    let client = Arc::new(Client::new(ClientConfig { base_url }));
    let run_start = Instant::now();

    let budgets: Vec<Option<u64>> = match plan.mode {
        RunMode::Requests(total) => split_requests(total, plan.concurrency)
            .into_iter()
            .map(Some)
            .collect(),
        RunMode::Duration(_) => vec![None; plan.concurrency],
    };
    let deadline = match plan.mode {
        RunMode::Duration(d) => Some(run_start + d),
        RunMode::Requests(_) => None,
    };

    let handles: Vec<_> = budgets
        .into_iter()
        .map(|budget| {
            let client = client.clone();
            let progress = progress.clone();
            tokio::spawn(worker_loop(client, profile, plan.think, budget, deadline, progress))
        })
        .collect();

    let mut metrics = Metrics::default();
    for handle in handles {
        match handle.await {
            Ok(worker_metrics) => metrics.merge(worker_metrics),
            Err(e) => tracing::error!(error = %e, "Worker task failed"),
        }
    }
    metrics.elapsed_secs = run_start.elapsed().as_secs_f64();
    metrics
}

async fn worker_loop(
    client: Arc<Client>,
    profile: WorkloadProfile,
    think: bool,
    budget: Option<u64>,
    deadline: Option<Instant>,
    progress: Arc<Progress>,
) -> Metrics {
    let mut rng = StdRng::from_entropy();
    let mut metrics = Metrics::default();
    let mut sent: u64 = 0;

    loop {
        if budget.is_some_and(|b| sent >= b) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let endpoint = profile.sample(&mut rng);
        let op_start = Instant::now();
        let result = client.hit(endpoint).await;
        let latency = op_start.elapsed();
        sent += 1;

        record(&mut metrics, endpoint, &result, latency);
        progress.sent.fetch_add(1, Ordering::Relaxed);
        if classify(endpoint, &result) == Outcome::Failure {
            progress.failed.fetch_add(1, Ordering::Relaxed);
        }

        if think {
            let pause = rng.gen_range(profile.think_time_ms());
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }

    metrics
}

/// Fold one hit into `metrics`.
pub fn record(metrics: &mut Metrics, endpoint: Endpoint, result: &Result<u16>, latency: Duration) {
    metrics.requests_total += 1;
    metrics.latency_ns.push(latency.as_nanos() as u64);
    if result.is_ok() {
        *metrics.delivered.entry(endpoint).or_insert(0) += 1;
    }
    match classify(endpoint, result) {
        Outcome::Success => metrics.successes += 1,
        Outcome::ExpectedError => metrics.expected_errors += 1,
        Outcome::Failure => {
            if let Err(e) = result {
                tracing::debug!(endpoint = endpoint.path(), error = %e, "Request failed");
            }
            metrics.failures += 1;
        }
    }
}
