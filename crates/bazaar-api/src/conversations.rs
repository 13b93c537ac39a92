use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use bazaar_db::models::{ConversationRow, ConversationSummaryRow};
use bazaar_db::parse_timestamp;
use bazaar_types::api::{Claims, ConversationSummary, CreateConversationRequest, CreateConversationResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::blocking;

/// Outcome of [`find_or_create`]: the pair's conversation and whether this call created it.
#[derive(Debug)]
pub struct FoundConversation {
    pub conversation: ConversationRow,
    pub created: bool,
}

/// Look up the conversation between the caller and `other_user_id`, creating
/// it on first contact. Safe under concurrent first contact from both sides.
pub async fn find_or_create(
    state: &AppState,
    current_user_id: i64,
    other_user_id: Option<i64>,
) -> Result<FoundConversation, ApiError> {
    let other_user_id = other_user_id.ok_or_else(|| ApiError::invalid("other_user_id is required"))?;
    if other_user_id == current_user_id {
        return Err(ApiError::invalid("Cannot start a conversation with yourself"));
    }

    let found = blocking(state, move |db| {
        if db.get_user_by_id(other_user_id)?.is_none() {
            return Ok(None);
        }
        db.find_or_create_conversation(current_user_id, other_user_id)
            .map(Some)
    })
    .await?;

    let (conversation, created) = found.ok_or_else(|| ApiError::not_found("User not found"))?;
    if created {
        info!(
            "Conversation {} created between {} and {}",
            conversation.id, current_user_id, other_user_id
        );
    }
    Ok(FoundConversation { conversation, created })
}

pub async fn get(state: &AppState, conversation_id: i64) -> Result<Option<ConversationRow>, ApiError> {
    blocking(state, move |db| db.get_conversation(conversation_id)).await
}

pub async fn is_participant(state: &AppState, conversation_id: i64, user_id: i64) -> Result<bool, ApiError> {
    blocking(state, move |db| db.is_participant(conversation_id, user_id)).await
}

pub async fn list_for_user(state: &AppState, user_id: i64) -> Result<Vec<ConversationSummary>, ApiError> {
    let rows = blocking(state, move |db| db.list_conversations(user_id)).await?;
    Ok(rows.into_iter().map(summary_from_row).collect())
}

fn summary_from_row(row: ConversationSummaryRow) -> ConversationSummary {
    let last_message_time = row.last_message_at.as_deref().and_then(|raw| {
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            warn!("Corrupt last message time '{}' on conversation {}", raw, row.id);
        }
        parsed
    });

    ConversationSummary {
        id: row.id,
        other_username: row.other_username,
        other_user_id: row.other_user_id,
        last_message: row.last_message,
        last_message_time,
    }
}

// -- Handlers --

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    debug!("{} opening conversation with {:?}", claims.sub, req.other_user_id);

    let found = find_or_create(&state, claims.sub, req.other_user_id).await?;

    let (status, message) = if found.created {
        (StatusCode::CREATED, "Conversation created successfully")
    } else {
        (StatusCode::OK, "Existing conversation found")
    };

    Ok((
        status,
        Json(CreateConversationResponse {
            id: found.conversation.id,
            message: message.to_string(),
        }),
    ))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = list_for_user(&state, claims.sub).await?;
    Ok(Json(conversations))
}
