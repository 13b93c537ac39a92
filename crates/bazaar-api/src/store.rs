use tracing::error;

use bazaar_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run a blocking storage call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Storage(anyhow::anyhow!("storage task failed: {}", e))
        })?
        .map_err(ApiError::Storage)
}
