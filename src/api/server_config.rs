//! Server limits

use std::time::Duration;

/// Concurrent requests
pub const MAX_CONCURRENCY: usize = 256;

/// Request body limit; every route is a GET
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Per-request timeout, covers provider round trips
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Period of the expired login flow sweep
pub const FLOW_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
