//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod detect;
pub mod health;
pub mod seal;

use std::time::Duration;

use aureo_core::{CancelToken, PoolError, SealPool};

pub use crate::state::AppState;
pub use detect::{detect_handler, DetectResponse, DetectStatus};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use seal::{seal_handler, SealResponse};

use crate::error::ApiError;

/// Run `task` on the worker pool and wait for it without blocking the runtime.
///
/// A full queue is rejected immediately. Waiting past `timeout` cancels the job
/// and yields `PoolError::TimedOut`, leaving the caller to decide what that means.
pub(crate) async fn run_on_pool<T, F>(
    pool: &SealPool,
    timeout: Duration,
    task: F,
) -> Result<Result<T, PoolError>, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> T + Send + 'static,
{
    let handle = pool.submit(task)?;
    tokio::task::spawn_blocking(move || handle.wait(timeout))
        .await
        .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))
}
