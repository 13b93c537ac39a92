use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, listings, conversations, messages, notifications)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            -- Owned by the listings module; read here for view notifications.
            CREATE TABLE listings (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    INTEGER NOT NULL REFERENCES users(id),
                kind        TEXT NOT NULL CHECK (kind IN ('ad', 'service')),
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price       REAL,
                created_at  TEXT NOT NULL
            );

            -- The pair is stored normalised (smaller id first) so the UNIQUE
            -- constraint covers both directions of first contact.
            CREATE TABLE conversations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                participant_a   INTEGER NOT NULL REFERENCES users(id),
                participant_b   INTEGER NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                CHECK (participant_a < participant_b),
                UNIQUE (participant_a, participant_b)
            );

            CREATE INDEX idx_conversations_b ON conversations(participant_b);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL CHECK (length(content) > 0),
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, id);

            CREATE TABLE notifications (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                type            TEXT NOT NULL,
                content         TEXT NOT NULL,
                related_id      INTEGER,
                additional_data TEXT,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
