use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{debug, warn};

use bazaar_db::models::NotificationRow;
use bazaar_db::parse_timestamp;
use bazaar_types::api::{Claims, MarkReadResponse};
use bazaar_types::notifications::{Notification, NotificationData};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::blocking;

/// Most recent notifications returned per inbox fetch.
pub const INBOX_LIMIT: u32 = 50;

pub(crate) fn notification_from_row(row: NotificationRow) -> anyhow::Result<Notification> {
    let data = NotificationData::from_stored(&row.kind, row.additional_data.as_deref())?;
    let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on notification {}", row.created_at, row.id);
        chrono::DateTime::default()
    });

    Ok(Notification {
        id: row.id,
        user_id: row.user_id,
        data,
        content: row.content,
        related_id: row.related_id,
        is_read: row.is_read,
        created_at,
    })
}

/// Up to [`INBOX_LIMIT`] notifications for `user_id`, newest first.
/// Rows that no longer decode are skipped rather than failing the inbox.
pub async fn list(state: &AppState, user_id: i64) -> Result<Vec<Notification>, ApiError> {
    let rows = blocking(state, move |db| db.get_notifications(user_id, INBOX_LIMIT)).await?;

    let notifications = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            notification_from_row(row)
                .map_err(|e| warn!("Skipping undecodable notification {}: {:#}", id, e))
                .ok()
        })
        .collect();

    Ok(notifications)
}

/// Idempotent `unread -> read` on one of the caller's own notifications.
/// Returns whether this call changed anything; ids that are unknown or belong
/// to someone else are a silent no-op.
pub async fn mark_read(state: &AppState, notification_id: i64, user_id: i64) -> Result<bool, ApiError> {
    let changed = blocking(state, move |db| db.mark_notification_read(notification_id, user_id)).await?;
    debug!("mark_read {} by {}: changed={}", notification_id, user_id, changed);
    Ok(changed)
}

// -- Handlers --

pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = list(&state, claims.sub).await?;
    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    mark_read(&state, notification_id, claims.sub).await?;
    Ok(Json(MarkReadResponse { success: true }))
}
