use std::time::Duration;

/// Address the server binds to when `HOST` is not set.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Port the server binds to when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 8080;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "loadlab_server=info,tower_http=info";

/// Pause between two `/stream` chunks.
pub const STREAM_INTERVAL: Duration = Duration::from_millis(loadlab_common::STREAM_INTERVAL_MS);
