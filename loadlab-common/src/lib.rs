use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fibonacci index computed by the CPU-bound endpoint.
pub const FIBONACCI_N: u32 = 35;
/// Number of separate blocks allocated by the memory-bound endpoint.
pub const MEMORY_BLOCK_COUNT: usize = 10;
/// Size of each memory block (1 MiB).
pub const MEMORY_BLOCK_BYTES: usize = 1_048_576;
/// Inclusive bounds of the `/slow` delay, in milliseconds.
pub const SLOW_DELAY_MIN_MS: u64 = 100;
pub const SLOW_DELAY_MAX_MS: u64 = 500;
/// Probability that `/error` answers with a simulated failure.
pub const ERROR_RATE: f64 = 0.3;
/// Exact filler length returned by `/large`.
pub const LARGE_PAYLOAD_BYTES: usize = 1_048_576;
/// Number of subtasks fanned out by `/async`.
pub const SUBTASK_COUNT: usize = 5;
/// Exclusive upper bound of each subtask's delay, in milliseconds.
pub const SUBTASK_MAX_DELAY_MS: u64 = 100;
/// Number of numbered chunks written by `/stream` before the completion line.
pub const STREAM_CHUNK_COUNT: u32 = 10;
/// Pause between two `/stream` chunks, in milliseconds.
pub const STREAM_INTERVAL_MS: u64 = 100;
/// Final line of every `/stream` body.
pub const STREAM_COMPLETED_LINE: &str = "Stream completed";

/// Error types for LoadLab operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadLabError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// JSON error envelope returned by the server for all error responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Result type for LoadLab operations
pub type Result<T> = std::result::Result<T, LoadLabError>;

/// Every route the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Docs,
    Health,
    Cpu,
    Slow,
    Memory,
    Json,
    Error,
    Stats,
    Large,
    Async,
    Stream,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Docs,
        Endpoint::Health,
        Endpoint::Cpu,
        Endpoint::Slow,
        Endpoint::Memory,
        Endpoint::Json,
        Endpoint::Error,
        Endpoint::Stats,
        Endpoint::Large,
        Endpoint::Async,
        Endpoint::Stream,
    ];

    /// Request path, which is also the key used in `requests_by_endpoint`.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Docs => "/",
            Endpoint::Health => "/health",
            Endpoint::Cpu => "/cpu",
            Endpoint::Slow => "/slow",
            Endpoint::Memory => "/memory",
            Endpoint::Json => "/json",
            Endpoint::Error => "/error",
            Endpoint::Stats => "/stats",
            Endpoint::Large => "/large",
            Endpoint::Async => "/async",
            Endpoint::Stream => "/stream",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::Json => "POST",
            _ => "GET",
        }
    }

    /// One-line description shown by the documentation endpoint.
    pub fn description(&self) -> &'static str {
        match self {
            Endpoint::Docs => "API documentation",
            Endpoint::Health => "Quick health check",
            Endpoint::Cpu => "CPU intensive operation (Fibonacci)",
            Endpoint::Slow => "Slow response with random delay (100-500ms)",
            Endpoint::Memory => "Memory intensive operation (10MB allocation)",
            Endpoint::Json => "JSON parsing test",
            Endpoint::Error => "Random error simulation (30% error rate)",
            Endpoint::Stats => "Server statistics and metrics",
            Endpoint::Large => "Large response test (1MB)",
            Endpoint::Async => "Async operations test",
            Endpoint::Stream => "Streaming response test",
        }
    }

    /// `"GET /health"` style label.
    pub fn label(&self) -> String {
        format!("{} {}", self.method(), self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Process uptime in fractional seconds.
    pub uptime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuResponse {
    pub result: u64,
    pub duration_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowResponse {
    pub message: String,
    pub delay_ms: u64,
}

/// Process memory figures in MiB, rounded to the nearest integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss_mb: u64,
    pub heap_used_mb: u64,
    pub heap_total_mb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub message: String,
    pub allocated_mb: u64,
    pub memory_usage: MemoryUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEchoResponse {
    pub message: String,
    pub received_keys: usize,
    pub echo: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCheckResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub version: String,
    pub platform: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub error_count: u64,
    pub error_rate: String,
    pub requests_per_second: String,
    pub memory_usage: MemoryUsage,
    pub process: ProcessInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeResponse {
    pub message: String,
    pub size_bytes: usize,
    pub size_mb: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncResponse {
    pub message: String,
    pub results: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsResponse {
    pub message: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
    pub usage: BTreeMap<String, String>,
}
