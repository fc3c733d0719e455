use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    kind       TEXT NOT NULL,                     -- system, grade, message, ...
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    school_id  TEXT REFERENCES schools(id) ON DELETE SET NULL,
    is_read    INTEGER NOT NULL DEFAULT 0,
    priority   TEXT NOT NULL DEFAULT 'medium',
    metadata   TEXT,                              -- JSON
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS chat_rooms (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    description   TEXT,
    room_type     TEXT NOT NULL,                  -- direct|class|school|general
    school_id     TEXT REFERENCES schools(id) ON DELETE CASCADE,
    class_id      TEXT REFERENCES classes(id) ON DELETE CASCADE,
    created_by_id TEXT REFERENCES users(id),
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_room_members (
    id           TEXT PRIMARY KEY NOT NULL,
    room_id      TEXT NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
    user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role         TEXT NOT NULL DEFAULT 'member',  -- admin|moderator|member
    joined_at    TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_room_members_unique ON chat_room_members(room_id, user_id);
CREATE INDEX IF NOT EXISTS idx_chat_room_members_user ON chat_room_members(user_id);

CREATE TABLE IF NOT EXISTS chat_messages (
    id             TEXT PRIMARY KEY NOT NULL,
    sender_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    receiver_id    TEXT REFERENCES users(id) ON DELETE CASCADE,
    room_id        TEXT REFERENCES chat_rooms(id) ON DELETE CASCADE,
    content        TEXT NOT NULL,
    message_type   TEXT NOT NULL DEFAULT 'text',  -- text|file|image
    attachment_url TEXT,
    is_read        INTEGER NOT NULL DEFAULT 0,
    reply_to_id    TEXT REFERENCES chat_messages(id) ON DELETE SET NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_room_ts ON chat_messages(room_id, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
