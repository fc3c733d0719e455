//! Chat rooms, their members, and chat messages.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use emsu_shared::MemberRole;

use crate::codec::{enum_at, now, opt_id, opt_ts_at, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    ChatMessage, ChatMessageView, ChatRoom, ChatRoomMember, NewChatMessage, NewChatRoom,
    RoomSummary,
};

const ROOM_COLUMNS: &str = "id, name, description, room_type, school_id, class_id, created_by_id,
     is_active, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, m.receiver_id, m.room_id, m.content,
     m.message_type, m.attachment_url, m.is_read, m.reply_to_id, m.created_at, m.updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub fn create_chat_room(&self, new: &NewChatRoom) -> Result<ChatRoom> {
        let now = now();
        let room = ChatRoom {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            description: new.description.clone(),
            room_type: new.room_type,
            school_id: new.school_id,
            class_id: new.class_id,
            created_by_id: new.created_by_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO chat_rooms (id, name, description, room_type, school_id, class_id,
                                     created_by_id, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
            params![
                room.id.to_string(),
                room.name,
                room.description,
                room.room_type.as_str(),
                opt_id(room.school_id),
                opt_id(room.class_id),
                opt_id(room.created_by_id),
                ts(&room.created_at),
                ts(&room.updated_at),
            ],
        )?;

        tracing::info!(room = %room.id, kind = %room.room_type, "chat room created");
        Ok(room)
    }

    pub fn get_chat_room(&self, id: Uuid) -> Result<Option<ChatRoom>> {
        let room = self
            .conn()
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = ?1"),
                params![id.to_string()],
                |row| {
                    Ok(ChatRoom {
                        id: uuid_at(row, 0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        room_type: enum_at(row, 3)?,
                        school_id: opt_uuid_at(row, 4)?,
                        class_id: opt_uuid_at(row, 5)?,
                        created_by_id: opt_uuid_at(row, 6)?,
                        is_active: row.get(7)?,
                        created_at: ts_at(row, 8)?,
                        updated_at: ts_at(row, 9)?,
                    })
                },
            )
            .optional()?;
        Ok(room)
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add `user_id` to the room. Joining twice keeps the original
    /// membership row and role.
    pub fn join_chat_room(&self, room_id: Uuid, user_id: Uuid, role: MemberRole) -> Result<ChatRoomMember> {
        let now = now();
        self.conn().execute(
            "INSERT OR IGNORE INTO chat_room_members (id, room_id, user_id, role, joined_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                Uuid::new_v4().to_string(),
                room_id.to_string(),
                user_id.to_string(),
                role.as_str(),
                ts(&now),
            ],
        )?;

        self.get_room_member(room_id, user_id)?
            .ok_or(StoreError::NotFound)
    }

    pub fn get_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<ChatRoomMember>> {
        let member = self
            .conn()
            .query_row(
                "SELECT id, room_id, user_id, role, joined_at, last_seen_at
                 FROM chat_room_members
                 WHERE room_id = ?1 AND user_id = ?2",
                params![room_id.to_string(), user_id.to_string()],
                |row| {
                    Ok(ChatRoomMember {
                        id: uuid_at(row, 0)?,
                        room_id: uuid_at(row, 1)?,
                        user_id: uuid_at(row, 2)?,
                        role: enum_at(row, 3)?,
                        joined_at: ts_at(row, 4)?,
                        last_seen_at: ts_at(row, 5)?,
                    })
                },
            )
            .optional()?;
        Ok(member)
    }

    /// Move the member's last-seen mark to now. Returns `false` when the
    /// user is not a member of the room.
    pub fn mark_room_seen(&self, room_id: Uuid, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chat_room_members SET last_seen_at = ?3
             WHERE room_id = ?1 AND user_id = ?2",
            params![room_id.to_string(), user_id.to_string(), ts(&now())],
        )?;
        Ok(affected > 0)
    }

    /// Rooms the user belongs to with their latest message and the number
    /// of messages from others the user has not read since last seeing the
    /// room. Most recently active rooms first; rooms without messages follow,
    /// newest room first.
    pub fn list_room_summaries_for_user(&self, user_id: Uuid) -> Result<Vec<RoomSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.name, r.description, r.room_type,
                    last.content, last.created_at,
                    (SELECT COUNT(*) FROM chat_messages u
                     WHERE u.room_id = r.id
                       AND u.sender_id <> ?1
                       AND u.is_read = 0
                       AND u.created_at > mem.last_seen_at) AS unread
             FROM chat_rooms r
             JOIN chat_room_members mem ON mem.room_id = r.id AND mem.user_id = ?1
             LEFT JOIN chat_messages last ON last.id = (
                 SELECT l.id FROM chat_messages l
                 WHERE l.room_id = r.id
                 ORDER BY l.created_at DESC, l.rowid DESC
                 LIMIT 1
             )
             WHERE r.is_active = 1
             ORDER BY last.created_at IS NULL, last.created_at DESC, r.created_at DESC, r.rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok(RoomSummary {
                id: uuid_at(row, 0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                room_type: enum_at(row, 3)?,
                last_message: row.get(4)?,
                last_message_time: opt_ts_at(row, 5)?,
                unread_count: row.get(6)?,
            })
        })?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(row?);
        }
        Ok(rooms)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn create_chat_message(&self, new: &NewChatMessage) -> Result<ChatMessage> {
        if new.content.trim().is_empty() {
            return Err(StoreError::Validation("message content is empty".into()));
        }
        if new.room_id.is_none() && new.receiver_id.is_none() {
            return Err(StoreError::Validation("a room or a receiver is required".into()));
        }

        let now = now();
        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            room_id: new.room_id,
            content: new.content.clone(),
            message_type: new.message_type,
            attachment_url: new.attachment_url.clone(),
            is_read: false,
            reply_to_id: new.reply_to_id,
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO chat_messages (id, sender_id, receiver_id, room_id, content, message_type,
                                        attachment_url, is_read, reply_to_id, created_at,
                                        updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                opt_id(message.receiver_id),
                opt_id(message.room_id),
                message.content,
                message.message_type.as_str(),
                message.attachment_url,
                opt_id(message.reply_to_id),
                ts(&message.created_at),
                ts(&message.updated_at),
            ],
        )?;
        Ok(message)
    }

    pub fn get_chat_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        let message = self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.id = ?1"),
                params![id.to_string()],
                row_to_chat_message,
            )
            .optional()?;
        Ok(message)
    }

    /// The `limit` most recent messages of a room, newest first, each with
    /// its sender's first and last name.
    pub fn list_chat_messages_by_room(&self, room_id: Uuid, limit: u32) -> Result<Vec<ChatMessageView>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}, u.first_name, u.last_name
             FROM chat_messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.room_id = ?1
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![room_id.to_string(), limit], |row| {
            Ok(ChatMessageView {
                message: row_to_chat_message(row)?,
                sender_name: row.get(11)?,
                sender_last_name: row.get(12)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Returns `false` when no such message exists.
    pub fn mark_chat_message_read(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chat_messages SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_chat_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: opt_uuid_at(row, 2)?,
        room_id: opt_uuid_at(row, 3)?,
        content: row.get(4)?,
        message_type: enum_at(row, 5)?,
        attachment_url: row.get(6)?,
        is_read: row.get(7)?,
        reply_to_id: opt_uuid_at(row, 8)?,
        created_at: ts_at(row, 9)?,
        updated_at: ts_at(row, 10)?,
    })
}
