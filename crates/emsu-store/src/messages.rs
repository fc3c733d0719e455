use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{now, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, NewMessage};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, subject, content, is_read, created_at";

impl Database {
    pub fn create_message(&self, new: &NewMessage) -> Result<Message> {
        if new.content.trim().is_empty() {
            return Err(StoreError::Validation("message content is empty".into()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            recipient_id: new.recipient_id,
            subject: new.subject.clone(),
            content: new.content.clone(),
            is_read: false,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, subject, content, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                message.recipient_id.to_string(),
                message.subject,
                message.content,
                ts(&message.created_at),
            ],
        )?;

        tracing::debug!(message = %message.id, to = %message.recipient_id, "direct message stored");
        Ok(message)
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let message = self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Inbound messages, newest first.
    pub fn list_messages_for_recipient(&self, recipient_id: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![recipient_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Both directions of a conversation between two users, oldest first.
    pub fn get_conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2)
                OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Returns `false` when no such message exists.
    pub fn mark_message_read(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        recipient_id: uuid_at(row, 2)?,
        subject: row.get(3)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}
