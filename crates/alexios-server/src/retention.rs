//! Background task for enforcing message retention.

use alexios_store::{MessageStore, StoreResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Deletes every message older than `max_age`. Returns the number removed.
pub async fn purge_expired(
    store: &dyn MessageStore,
    max_age: chrono::Duration,
) -> StoreResult<usize> {
    let cutoff = Utc::now() - max_age;
    store.purge_messages_before(cutoff).await
}

/// Starts a background task that periodically deletes expired messages.
///
/// This task runs indefinitely; it sleeps before the first run so startup
/// is not slowed by a purge.
pub async fn start_retention_task(
    store: Arc<dyn MessageStore>,
    max_age_days: u32,
    interval: Duration,
) {
    let max_age = chrono::Duration::days(i64::from(max_age_days));
    tracing::info!(
        max_age_days,
        interval_seconds = interval.as_secs(),
        "starting message retention enforcement task"
    );

    loop {
        sleep(interval).await;

        match purge_expired(store.as_ref(), max_age).await {
            Ok(count) if count > 0 => tracing::info!(count, "deleted expired messages"),
            Ok(_) => tracing::debug!("no expired messages to delete"),
            Err(e) => tracing::error!(error = %e, "failed to delete expired messages"),
        }
    }
}
