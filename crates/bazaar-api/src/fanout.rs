use tracing::{debug, warn};

use bazaar_types::api::ListingKind;
use bazaar_types::notifications::{NewMessageData, Notification, NotificationData};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::notifications::notification_from_row;
use crate::store::blocking;

/// Warning surfaced to callers whose action succeeded but whose notification did not.
pub const DELIVERY_WARNING: &str = "Recipient could not be notified";

/// A notification about to be emitted. `actor_id` is whoever triggered the
/// event; it is never the recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub recipient_id: i64,
    pub actor_id: i64,
    pub data: NotificationData,
    pub content: String,
    pub related_id: Option<i64>,
}

impl NotificationDraft {
    pub fn new_message(
        recipient_id: i64,
        conversation_id: i64,
        sender_id: i64,
        sender_username: &str,
    ) -> Self {
        Self {
            recipient_id,
            actor_id: sender_id,
            data: NotificationData::NewMessage(NewMessageData {
                sender_id,
                sender_username: sender_username.to_string(),
                conversation_id,
            }),
            content: format!("New message from {}", sender_username),
            related_id: Some(conversation_id),
        }
    }

    /// `None` when the owner is looking at their own listing.
    pub fn listing_viewed(
        owner_id: i64,
        viewer_id: i64,
        listing_id: i64,
        kind: ListingKind,
        title: &str,
    ) -> Option<Self> {
        if owner_id == viewer_id {
            return None;
        }

        let (data, content) = match kind {
            ListingKind::Ad => (
                NotificationData::AdView,
                format!("Someone viewed your ad: \"{}\"", title),
            ),
            ListingKind::Service => (
                NotificationData::ServiceView,
                format!("Someone viewed your service: \"{}\"", title),
            ),
        };

        Some(Self {
            recipient_id: owner_id,
            actor_id: viewer_id,
            data,
            content,
            related_id: Some(listing_id),
        })
    }
}

/// Persist one notification row for the draft. No deduplication: every
/// triggering event produces exactly one row.
pub async fn emit(state: &AppState, draft: NotificationDraft) -> Result<Notification, ApiError> {
    if draft.recipient_id == draft.actor_id {
        return Err(ApiError::invalid("A notification cannot be addressed to its own actor"));
    }

    let payload = draft
        .data
        .payload_json()
        .map_err(|e| ApiError::Storage(e.into()))?;
    let kind = draft.data.kind();

    let row = blocking(state, move |db| {
        db.insert_notification(
            draft.recipient_id,
            kind,
            &draft.content,
            draft.related_id,
            payload.as_deref(),
        )
    })
    .await?;

    debug!("Notification {} ({}) for user {}", row.id, row.kind, row.user_id);
    notification_from_row(row).map_err(ApiError::Storage)
}

/// Emit without letting a failure escape: the triggering action has already
/// succeeded. Returns the warning to hand back to the caller, if any.
pub async fn emit_best_effort(state: &AppState, draft: NotificationDraft) -> Option<String> {
    let recipient = draft.recipient_id;
    let kind = draft.data.kind();

    match emit(state, draft).await {
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to notify user {} ({}): {}", recipient, kind.as_str(), e);
            Some(DELIVERY_WARNING.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use bazaar_types::notifications::NotificationKind;

    use super::*;
    use crate::testing::{count, state_with_users};

    #[test]
    fn new_message_draft_is_templated() {
        let draft = NotificationDraft::new_message(2, 100, 1, "alice");
        assert_eq!(draft.content, "New message from alice");
        assert_eq!(draft.related_id, Some(100));
        assert_eq!(draft.data.kind(), NotificationKind::NewMessage);
        assert_eq!(
            draft.data,
            NotificationData::NewMessage(NewMessageData {
                sender_id: 1,
                sender_username: "alice".into(),
                conversation_id: 100,
            })
        );
    }

    #[test]
    fn self_view_produces_no_draft() {
        assert!(NotificationDraft::listing_viewed(5, 5, 9, ListingKind::Ad, "Bike").is_none());

        let draft = NotificationDraft::listing_viewed(5, 6, 9, ListingKind::Ad, "Bike").unwrap();
        assert_eq!(draft.recipient_id, 5);
        assert_eq!(draft.content, "Someone viewed your ad: \"Bike\"");
        assert_eq!(draft.data, NotificationData::AdView);

        let draft =
            NotificationDraft::listing_viewed(5, 6, 9, ListingKind::Service, "Tuning").unwrap();
        assert_eq!(draft.data, NotificationData::ServiceView);
        assert_eq!(draft.content, "Someone viewed your service: \"Tuning\"");
    }

    #[tokio::test]
    async fn emit_never_notifies_the_actor() {
        let (state, ids) = state_with_users(&["alice"]);
        let draft = NotificationDraft::new_message(ids[0], 1, ids[0], "alice");

        assert!(matches!(emit(&state, draft).await, Err(ApiError::InvalidInput(_))));
        assert_eq!(count(&state, "notifications"), 0);
    }

    #[tokio::test]
    async fn every_emit_creates_a_row() {
        let (state, ids) = state_with_users(&["alice", "bob"]);

        for _ in 0..2 {
            let draft = NotificationDraft::new_message(ids[1], 7, ids[0], "alice");
            let n = emit(&state, draft).await.unwrap();
            assert_eq!(n.user_id, ids[1]);
            assert!(!n.is_read);
        }
        assert_eq!(count(&state, "notifications"), 2);
    }

    #[tokio::test]
    async fn best_effort_turns_failures_into_a_warning() {
        let (state, ids) = state_with_users(&["alice", "bob"]);
        state
            .db
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE notifications")?))
            .unwrap();

        let draft = NotificationDraft::new_message(ids[1], 7, ids[0], "alice");
        let warning = emit_best_effort(&state, draft).await;
        assert_eq!(warning.as_deref(), Some(DELIVERY_WARNING));
    }
}
