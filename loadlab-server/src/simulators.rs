//! Workload simulators. Each function encodes one fixed resource-consumption pattern.

use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::try_join_all;
use futures::stream::{self, Stream};
use loadlab_common::{
    ERROR_RATE, FIBONACCI_N, LARGE_PAYLOAD_BYTES, MEMORY_BLOCK_BYTES, MEMORY_BLOCK_COUNT,
    SLOW_DELAY_MAX_MS, SLOW_DELAY_MIN_MS, STREAM_CHUNK_COUNT, STREAM_COMPLETED_LINE, SUBTASK_COUNT,
    SUBTASK_MAX_DELAY_MS,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::{Clock, RandomSource};

/// Failures a simulator can report. Every variant is answered with a 500 and counted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("This is a simulated error")]
    Injected,

    #[error("Could not allocate {bytes} bytes: {reason}")]
    AllocationFailed { bytes: usize, reason: String },

    #[error("Subtask failed to complete: {0}")]
    SubtaskFailed(String),
}

impl WorkloadError {
    /// Short label placed in the `error` field of the response envelope.
    pub fn title(&self) -> &'static str {
        match self {
            WorkloadError::Injected => "Random error occurred",
            WorkloadError::AllocationFailed { .. } => "Memory allocation failed",
            WorkloadError::SubtaskFailed(_) => "Async operations failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// --- CPU ---

/// Naive exponential-time Fibonacci. Intentionally not memoised.
pub fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}

#[derive(Debug, Clone, Copy)]
pub struct ComputeOutcome {
    pub result: u64,
    pub duration: Duration,
}

/// Compute `fibonacci(FIBONACCI_N)` on the calling thread without yielding.
pub fn compute_bound() -> ComputeOutcome {
    let start = Instant::now();
    let result = fibonacci(std::hint::black_box(FIBONACCI_N));
    ComputeOutcome { result, duration: start.elapsed() }
}

// --- Memory ---

/// Zero-initialised blocks kept alive until the caller drops them.
pub struct MemoryHold {
    blocks: Vec<Vec<u8>>,
}

impl MemoryHold {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn allocated_mb(&self) -> u64 {
        (self.allocated_bytes() / (1024 * 1024)) as u64
    }
}

/// Allocate `count` zeroed blocks of `block_bytes` each, reporting failure instead of aborting.
pub fn allocate_blocks(count: usize, block_bytes: usize) -> Result<MemoryHold, WorkloadError> {
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let mut block: Vec<u8> = Vec::new();
        block
            .try_reserve_exact(block_bytes)
            .map_err(|e| WorkloadError::AllocationFailed {
                bytes: block_bytes,
                reason: e.to_string(),
            })?;
        block.resize(block_bytes, 0);
        blocks.push(block);
    }
    Ok(MemoryHold { blocks })
}

/// Ten 1 MiB allocations.
pub fn memory_bound() -> Result<MemoryHold, WorkloadError> {
    allocate_blocks(MEMORY_BLOCK_COUNT, MEMORY_BLOCK_BYTES)
}

// --- Latency ---

pub fn pick_delay_ms(rng: &dyn RandomSource) -> u64 {
    rng.between(SLOW_DELAY_MIN_MS, SLOW_DELAY_MAX_MS)
}

/// Sleep for a uniformly drawn delay in `[100, 500]` ms and return the delay.
pub async fn delay_bound(rng: &dyn RandomSource) -> u64 {
    let delay_ms = pick_delay_ms(rng);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    delay_ms
}

// --- Errors ---

pub fn roll_failure(rng: &dyn RandomSource) -> bool {
    rng.unit() < ERROR_RATE
}

/// Fail with probability `ERROR_RATE`.
pub fn inject_error(rng: &dyn RandomSource) -> Result<(), WorkloadError> {
    if roll_failure(rng) {
        Err(WorkloadError::Injected)
    } else {
        Ok(())
    }
}

// --- Payload ---

pub fn large_payload() -> String {
    "x".repeat(LARGE_PAYLOAD_BYTES)
}

/// Size in MiB with two decimals, e.g. `"1.00"`.
pub fn size_mb_label(bytes: usize) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

// --- Fan-out ---

/// Spawn one task per delay and join them in launch order.
pub async fn run_subtasks(delays_ms: Vec<u64>) -> Result<Vec<String>, WorkloadError> {
    let handles = delays_ms.into_iter().enumerate().map(|(i, delay_ms)| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            format!("Operation {} completed", i + 1)
        })
    });

    try_join_all(handles)
        .await
        .map_err(|e| WorkloadError::SubtaskFailed(e.to_string()))
}

/// Five subtasks, each sleeping a random `[0, 100)` ms.
pub async fn concurrent_subtasks(rng: &dyn RandomSource) -> Result<Vec<String>, WorkloadError> {
    let delays = (0..SUBTASK_COUNT)
        .map(|_| rng.between(0, SUBTASK_MAX_DELAY_MS - 1))
        .collect();
    run_subtasks(delays).await
}

// --- Streaming ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Data { sequence: u32, timestamp: DateTime<Utc> },
    Completed,
}

impl fmt::Display for StreamChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamChunk::Data { sequence, timestamp } => writeln!(
                f,
                "Chunk {}: {}",
                sequence,
                timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            StreamChunk::Completed => writeln!(f, "{}", STREAM_COMPLETED_LINE),
        }
    }
}

/// Ten numbered chunks, one per `interval`, followed by `Completed`.
///
/// Nothing runs between polls, so dropping the stream (client disconnect) stops production.
pub fn chunk_stream(
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> impl Stream<Item = StreamChunk> + Send {
    stream::unfold(0u32, move |emitted| {
        let clock = clock.clone();
        async move {
            if emitted > STREAM_CHUNK_COUNT {
                return None;
            }
            if emitted == STREAM_CHUNK_COUNT {
                return Some((StreamChunk::Completed, emitted + 1));
            }
            tokio::time::sleep(interval).await;
            let sequence = emitted + 1;
            Some((StreamChunk::Data { sequence, timestamp: clock.now() }, sequence))
        }
    })
}
