use crate::models::{
    ConversationRow, ConversationSummaryRow, ListingRow, MessageRow, NotificationRow, UserRow,
};
use crate::{Database, now_timestamp};
use anyhow::{Result, bail};
use bazaar_types::notifications::NotificationKind;
use rusqlite::{Connection, OptionalExtension, Row, params};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password, created_at FROM users WHERE username = ?1",
                    [username],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password, created_at FROM users WHERE id = ?1",
                    [id],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Listings --

    pub fn create_listing(
        &self,
        owner_id: i64,
        kind: &str,
        title: &str,
        description: &str,
        price: Option<f64>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO listings (owner_id, kind, title, description, price, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![owner_id, kind, title, description, price, now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_listing(&self, id: i64) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT l.id, l.owner_id, u.username, l.kind, l.title, l.description, l.price, l.created_at
                     FROM listings l
                     JOIN users u ON l.owner_id = u.id
                     WHERE l.id = ?1",
                    [id],
                    |row| {
                        Ok(ListingRow {
                            id: row.get(0)?,
                            owner_id: row.get(1)?,
                            owner_username: row.get(2)?,
                            kind: row.get(3)?,
                            title: row.get(4)?,
                            description: row.get(5)?,
                            price: row.get(6)?,
                            created_at: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Conversations --

    /// Return the conversation for the unordered pair, creating it if absent.
    /// The bool is true only for the call that inserted the row.
    pub fn find_or_create_conversation(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<(ConversationRow, bool)> {
        if user_id == other_user_id {
            bail!("conversation participants must differ (both are {})", user_id);
        }
        let (low, high) = if user_id < other_user_id {
            (user_id, other_user_id)
        } else {
            (other_user_id, user_id)
        };

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO conversations (participant_a, participant_b, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (participant_a, participant_b) DO NOTHING",
                params![low, high, now_timestamp()],
            )?;

            let row = conn.query_row(
                "SELECT id, participant_a, participant_b, created_at
                 FROM conversations
                 WHERE participant_a = ?1 AND participant_b = ?2",
                params![low, high],
                conversation_from_row,
            )?;

            Ok((row, inserted == 1))
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    pub fn is_participant(&self, conversation_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM conversations
                     WHERE id = ?1 AND (participant_a = ?2 OR participant_b = ?2)",
                    params![conversation_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Conversations of `user_id`, most recent message first. Conversations
    /// without messages come last, newest conversation first among them.
    pub fn list_conversations(&self, user_id: i64) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, u.id, u.username, m.content, m.created_at
                 FROM conversations c
                 JOIN users u
                   ON u.id = CASE WHEN c.participant_a = ?1 THEN c.participant_b ELSE c.participant_a END
                 LEFT JOIN messages m
                   ON m.id = (SELECT MAX(id) FROM messages WHERE conversation_id = c.id)
                 WHERE c.participant_a = ?1 OR c.participant_b = ?1
                 ORDER BY m.id IS NULL, m.created_at DESC, m.id DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationSummaryRow {
                        id: row.get(0)?,
                        other_user_id: row.get(1)?,
                        other_username: row.get(2)?,
                        last_message: row.get(3)?,
                        last_message_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, sender_id, content, now_timestamp()],
            )?;
            let id = conn.last_insert_rowid();

            let row = conn.query_row(
                "SELECT m.id, m.conversation_id, m.sender_id, u.username, m.content, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.id = ?1",
                [id],
                message_from_row,
            )?;
            Ok(row)
        })
    }

    /// All messages of a conversation in insertion order.
    pub fn get_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch sender_username in a single query
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, u.username, m.content, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.id ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Notifications --

    pub fn insert_notification(
        &self,
        user_id: i64,
        kind: NotificationKind,
        content: &str,
        related_id: Option<i64>,
        additional_data: Option<&str>,
    ) -> Result<NotificationRow> {
        self.with_conn_mut(|conn| {
            let created_at = now_timestamp();
            conn.execute(
                "INSERT INTO notifications (user_id, type, content, related_id, additional_data, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![user_id, kind.as_str(), content, related_id, additional_data, created_at],
            )?;

            Ok(NotificationRow {
                id: conn.last_insert_rowid(),
                user_id,
                kind: kind.as_str().to_string(),
                content: content.to_string(),
                related_id,
                additional_data: additional_data.map(str::to_string),
                is_read: false,
                created_at,
            })
        })
    }

    /// Newest first, at most `limit` rows.
    pub fn get_notifications(&self, user_id: i64, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, type, content, related_id, additional_data, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![user_id, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        content: row.get(3)?,
                        related_id: row.get(4)?,
                        additional_data: row.get(5)?,
                        is_read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Flip `is_read` on one of `user_id`'s own notifications.
    /// Returns false when nothing changed: already read, missing, or owned by someone else.
    pub fn mark_notification_read(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2 AND is_read = 0",
                params![id, user_id],
            )?;
            Ok(changed == 1)
        })
    }
}

fn query_conversation(conn: &Connection, id: i64) -> Result<Option<ConversationRow>> {
    let row = conn
        .query_row(
            "SELECT id, participant_a, participant_b, created_at FROM conversations WHERE id = ?1",
            [id],
            conversation_from_row,
        )
        .optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}
