/// Database row types: these map directly to SQLite rows.
/// Distinct from bazaar-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct ListingRow {
    pub id: i64,
    pub owner_id: i64,
    pub owner_username: String,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub price: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub id: i64,
    pub participant_a: i64,
    pub participant_b: i64,
    pub created_at: String,
}

impl ConversationRow {
    /// The other participant, or `None` if `user_id` is not in the pair.
    pub fn counterpart(&self, user_id: i64) -> Option<i64> {
        if self.participant_a == user_id {
            Some(self.participant_b)
        } else if self.participant_b == user_id {
            Some(self.participant_a)
        } else {
            None
        }
    }
}

pub struct ConversationSummaryRow {
    pub id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub content: String,
    pub related_id: Option<i64>,
    pub additional_data: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}
