//! HTTP request handlers.

use blotter_core::AppError;

/// Media capture endpoint.
pub mod capture;
/// Draft slot endpoints.
pub mod drafts;
/// Entry insert/move endpoints.
pub mod entries;
/// Post endpoints.
pub mod posts;
/// Bulk file upload endpoint.
pub mod uploads;

/// Run storage work that may wait on a post lock or the draft mutex on the
/// blocking pool, off the runtime workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        tracing::error!("Blocking handler task failed: {}", err);
        AppError::Internal
    })?
}
