use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use bazaar_db::models::{ConversationRow, MessageRow};
use bazaar_db::parse_timestamp;
use bazaar_types::api::{Claims, MessageResponse, PostMessageRequest, SendMessageRequest, SendMessageResponse};

use crate::auth::AppState;
use crate::conversations;
use crate::error::ApiError;
use crate::fanout::{self, NotificationDraft};
use crate::store::blocking;

/// A stored message plus the fan-out side channel.
#[derive(Debug)]
pub struct Appended {
    pub message: MessageResponse,
    /// Set when the recipient's notification could not be persisted.
    pub warning: Option<String>,
}

/// Append `content` to a conversation on behalf of `sender_id` and notify the
/// other participant. A failed notification never fails the append.
pub async fn append(
    state: &AppState,
    conversation_id: i64,
    sender_id: i64,
    sender_username: &str,
    content: &str,
) -> Result<Appended, ApiError> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::invalid("Message content is required"));
    }

    let conversation = conversations::get(state, conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversations::is_participant(state, conversation_id, sender_id).await? {
        return Err(ApiError::unauthorized(
            "Not authorized to send messages in this conversation",
        ));
    }
    let recipient_id = recipient_of(&conversation, sender_id);

    let row = blocking(state, move |db| db.insert_message(conversation_id, sender_id, &content)).await?;
    debug!("Message {} appended to conversation {}", row.id, conversation_id);

    let draft = NotificationDraft::new_message(recipient_id, conversation_id, sender_id, sender_username);
    let warning = fanout::emit_best_effort(state, draft).await;

    Ok(Appended {
        message: message_from_row(row),
        warning,
    })
}

/// All messages of the conversation, oldest first. Only participants may read.
pub async fn list_for_conversation(
    state: &AppState,
    conversation_id: i64,
    caller_id: i64,
) -> Result<Vec<MessageResponse>, ApiError> {
    if !conversations::is_participant(state, conversation_id, caller_id).await? {
        return Err(ApiError::unauthorized(
            "Not authorized to view messages in this conversation",
        ));
    }

    let rows = blocking(state, move |db| db.get_messages(conversation_id)).await?;
    Ok(rows.into_iter().map(message_from_row).collect())
}

/// The participant who is not `sender_id`. Callers check participation first,
/// so a stranger here is a bug.
fn recipient_of(conversation: &ConversationRow, sender_id: i64) -> i64 {
    match conversation.counterpart(sender_id) {
        Some(recipient) => recipient,
        None => unreachable!(
            "sender {} passed the participant check for conversation {} but is not in it",
            sender_id, conversation.id
        ),
    }
}

fn message_from_row(row: MessageRow) -> MessageResponse {
    let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on message {}", row.created_at, row.id);
        chrono::DateTime::default()
    });

    MessageResponse {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id,
        sender_username: row.sender_username,
        content: row.content,
        created_at,
    }
}

fn send_response(appended: Appended) -> (StatusCode, Json<SendMessageResponse>) {
    (
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id: appended.message.id,
            conversation_id: appended.message.conversation_id,
            created_at: appended.message.created_at,
            warning: appended.warning,
        }),
    )
}

// -- Handlers --

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let appended = append(&state, req.conversation_id, claims.sub, &claims.username, &req.content).await?;
    Ok(send_response(appended))
}

pub async fn post_conversation_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let appended = append(&state, conversation_id, claims.sub, &claims.username, &req.content).await?;
    Ok(send_response(appended))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = list_for_conversation(&state, conversation_id, claims.sub).await?;
    Ok(Json(messages))
}
