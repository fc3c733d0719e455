//! Chat rooms, chat messages, and the notification raised for a direct
//! message.

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use emsu_shared::constants::{
    DEFAULT_CHAT_MESSAGE_LIMIT, MAX_CHAT_MESSAGE_LIMIT, MESSAGE_PREVIEW_CHARS,
    NOTIFICATION_TYPE_MESSAGE,
};
use emsu_shared::{ChatRoomType, MemberRole, MessageType, NotificationPriority};
use emsu_store::{
    ChatMessage, ChatMessageView, ChatRoom, ChatRoomMember, Database, NewChatMessage, NewChatRoom,
    NewNotification, RoomSummary,
};

use crate::error::ServerError;
use crate::extract::AuthenticatedPrincipal;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// When present, must be the caller.
    pub sender_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub room_type: ChatRoomType,
    pub school_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
}

pub fn list_rooms(db: &Database, caller: &AuthenticatedPrincipal) -> Result<Vec<RoomSummary>, ServerError> {
    Ok(db.list_room_summaries_for_user(caller.id)?)
}

/// Newest messages of a room the caller belongs to. `limit` defaults to 50
/// and is clamped to 1..=200.
pub fn list_messages(
    db: &Database,
    caller: &AuthenticatedPrincipal,
    room_id: Uuid,
    limit: Option<u32>,
) -> Result<Vec<ChatMessageView>, ServerError> {
    ensure_member(db, caller, room_id)?;
    let limit = limit
        .unwrap_or(DEFAULT_CHAT_MESSAGE_LIMIT)
        .clamp(1, MAX_CHAT_MESSAGE_LIMIT);
    Ok(db.list_chat_messages_by_room(room_id, limit)?)
}

/// Persist a message from `caller`. A message with a receiver raises
/// exactly one notification for that receiver.
pub fn send_message(
    db: &Database,
    caller: &AuthenticatedPrincipal,
    req: SendMessageRequest,
) -> Result<ChatMessage, ServerError> {
    caller.check_self(req.sender_id)?;
    if req.content.trim().is_empty() {
        return Err(ServerError::BadRequest("content is required".into()));
    }
    if req.room_id.is_none() && req.receiver_id.is_none() {
        return Err(ServerError::BadRequest("roomId or receiverId is required".into()));
    }

    if let Some(room_id) = req.room_id {
        ensure_member(db, caller, room_id)?;
    }
    if let Some(receiver_id) = req.receiver_id {
        db.get_user(receiver_id)?
            .ok_or_else(|| ServerError::NotFound("Receiver".into()))?;
    }
    if let Some(reply_to_id) = req.reply_to_id {
        db.get_chat_message(reply_to_id)?
            .ok_or_else(|| ServerError::NotFound("Reply target".into()))?;
    }

    let message = db.create_chat_message(&NewChatMessage {
        sender_id: caller.id,
        receiver_id: req.receiver_id,
        room_id: req.room_id,
        content: req.content,
        message_type: req.message_type,
        attachment_url: req.attachment_url,
        reply_to_id: req.reply_to_id,
    })?;

    if let Some(receiver_id) = message.receiver_id {
        let school_id = db.get_school_for_user(receiver_id)?.map(|s| s.id);
        db.create_notification(&NewNotification {
            title: "New Message".into(),
            content: format!("You have a new message: {}...", preview(&message.content)),
            kind: NOTIFICATION_TYPE_MESSAGE.into(),
            user_id: receiver_id,
            school_id,
            priority: NotificationPriority::Medium,
            metadata: Some(json!({
                "messageId": message.id,
                "senderId": message.sender_id,
            })),
        })?;
    }

    tracing::info!(
        message = %message.id,
        sender = %message.sender_id,
        room = ?message.room_id,
        receiver = ?message.receiver_id,
        "chat message sent"
    );
    Ok(message)
}

/// Create a room with the caller as its first (admin) member.
pub fn create_room(
    db: &Database,
    caller: &AuthenticatedPrincipal,
    req: CreateRoomRequest,
) -> Result<ChatRoom, ServerError> {
    if req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("name is required".into()));
    }

    let room = db.create_chat_room(&NewChatRoom {
        name: req.name,
        description: req.description,
        room_type: req.room_type,
        school_id: req.school_id,
        class_id: req.class_id,
        created_by_id: Some(caller.id),
    })?;
    db.join_chat_room(room.id, caller.id, MemberRole::Admin)?;
    Ok(room)
}

pub fn join_room(db: &Database, caller: &AuthenticatedPrincipal, room_id: Uuid) -> Result<ChatRoomMember, ServerError> {
    let room = db
        .get_chat_room(room_id)?
        .filter(|r| r.is_active)
        .ok_or_else(|| ServerError::NotFound("Chat room".into()))?;
    let member = db.join_chat_room(room.id, caller.id, MemberRole::Member)?;
    tracing::debug!(room = %room.id, user = %caller.id, "joined chat room");
    Ok(member)
}

pub fn mark_room_seen(db: &Database, caller: &AuthenticatedPrincipal, room_id: Uuid) -> Result<(), ServerError> {
    if db.mark_room_seen(room_id, caller.id)? {
        Ok(())
    } else {
        Err(ServerError::NotFound("Room membership".into()))
    }
}

/// Only the receiver, or a fellow member of the room, may mark a message
/// read.
pub fn mark_message_read(db: &Database, caller: &AuthenticatedPrincipal, message_id: Uuid) -> Result<(), ServerError> {
    let message = db
        .get_chat_message(message_id)?
        .ok_or_else(|| ServerError::NotFound("Message".into()))?;

    let is_receiver = message.receiver_id == Some(caller.id);
    let in_room = match message.room_id {
        Some(room_id) => db.get_room_member(room_id, caller.id)?.is_some(),
        None => false,
    };
    if !is_receiver && !in_room {
        return Err(ServerError::Forbidden("not a recipient of this message".into()));
    }

    db.mark_chat_message_read(message.id)?;
    Ok(())
}

fn ensure_member(db: &Database, caller: &AuthenticatedPrincipal, room_id: Uuid) -> Result<(), ServerError> {
    db.get_chat_room(room_id)?
        .ok_or_else(|| ServerError::NotFound("Chat room".into()))?;
    if db.get_room_member(room_id, caller.id)?.is_none() {
        return Err(ServerError::Forbidden("not a member of this room".into()));
    }
    Ok(())
}

fn preview(content: &str) -> String {
    content.chars().take(MESSAGE_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::Role;

    fn caller(user: &emsu_store::User) -> AuthenticatedPrincipal {
        AuthenticatedPrincipal {
            id: user.id,
            role: user.role,
        }
    }

    fn direct(to: Uuid, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            sender_id: None,
            room_id: None,
            receiver_id: Some(to),
            content: content.into(),
            message_type: MessageType::Text,
            attachment_url: None,
            reply_to_id: None,
        }
    }

    fn room_request(name: &str) -> CreateRoomRequest {
        CreateRoomRequest {
            name: name.into(),
            description: None,
            room_type: ChatRoomType::General,
            school_id: None,
            class_id: None,
        }
    }

    #[test]
    fn direct_message_raises_one_notification() {
        let db = testutil::db();
        let sender = testutil::user(&db, Role::Teacher);
        let receiver = testutil::user(&db, Role::Parent);

        let long = "x".repeat(80);
        let message = send_message(&db, &caller(&sender), direct(receiver.id, &long)).unwrap();

        let notifications = db.list_notifications_for_user(receiver.id).unwrap();
        assert_eq!(notifications.len(), 1);
        let n = &notifications[0];
        assert_eq!(n.title, "New Message");
        assert_eq!(n.kind, "message");
        assert_eq!(n.priority, NotificationPriority::Medium);
        assert_eq!(n.content, format!("You have a new message: {}...", "x".repeat(50)));
        assert_eq!(n.metadata.as_ref().unwrap()["messageId"], message.id.to_string());
        assert_eq!(n.metadata.as_ref().unwrap()["senderId"], sender.id.to_string());

        assert!(db.list_notifications_for_user(sender.id).unwrap().is_empty());
    }

    #[test]
    fn preview_counts_characters() {
        let text = "é".repeat(60);
        assert_eq!(preview(&text).chars().count(), 50);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn room_message_raises_no_notification() {
        let db = testutil::db();
        let teacher = testutil::user(&db, Role::Teacher);
        let room = create_room(&db, &caller(&teacher), room_request("JSS1")).unwrap();

        let req = SendMessageRequest {
            room_id: Some(room.id),
            receiver_id: None,
            ..direct(Uuid::nil(), "hello class")
        };
        send_message(&db, &caller(&teacher), req).unwrap();

        let listed = list_messages(&db, &caller(&teacher), room.id, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sender_name.as_deref(), Some("Test"));
        assert_eq!(listed[0].sender_last_name.as_deref(), Some("teacher"));
        assert!(db.list_notifications_for_user(teacher.id).unwrap().is_empty());
    }

    #[test]
    fn invalid_sends_are_rejected() {
        let db = testutil::db();
        let sender = testutil::user(&db, Role::Teacher);
        let me = caller(&sender);

        let blank = direct(sender.id, "  ");
        assert!(matches!(send_message(&db, &me, blank), Err(ServerError::BadRequest(_))));

        let nowhere = SendMessageRequest {
            receiver_id: None,
            ..direct(sender.id, "hi")
        };
        assert!(matches!(send_message(&db, &me, nowhere), Err(ServerError::BadRequest(_))));

        let ghost = direct(Uuid::new_v4(), "hi");
        assert!(matches!(send_message(&db, &me, ghost), Err(ServerError::NotFound(_))));

        let spoofed = SendMessageRequest {
            sender_id: Some(Uuid::new_v4()),
            ..direct(sender.id, "hi")
        };
        assert!(matches!(send_message(&db, &me, spoofed), Err(ServerError::Forbidden(_))));

        let missing_room = SendMessageRequest {
            room_id: Some(Uuid::new_v4()),
            receiver_id: None,
            ..direct(sender.id, "hi")
        };
        assert!(matches!(send_message(&db, &me, missing_room), Err(ServerError::NotFound(_))));
    }

    #[test]
    fn creator_is_admin_and_sees_room() {
        let db = testutil::db();
        let teacher = testutil::user(&db, Role::Teacher);
        let student = testutil::user(&db, Role::Student);
        let room = create_room(&db, &caller(&teacher), room_request("JSS1")).unwrap();

        let member = db.get_room_member(room.id, teacher.id).unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Admin);
        assert_eq!(list_rooms(&db, &caller(&teacher)).unwrap().len(), 1);

        // outsiders can neither read nor post until they join
        assert!(matches!(
            list_messages(&db, &caller(&student), room.id, None),
            Err(ServerError::Forbidden(_))
        ));
        join_room(&db, &caller(&student), room.id).unwrap();
        assert!(list_messages(&db, &caller(&student), room.id, Some(0)).unwrap().is_empty());
        mark_room_seen(&db, &caller(&student), room.id).unwrap();

        assert!(matches!(
            create_room(&db, &caller(&teacher), room_request(" ")),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn only_recipients_mark_read() {
        let db = testutil::db();
        let sender = testutil::user(&db, Role::Teacher);
        let receiver = testutil::user(&db, Role::Parent);
        let bystander = testutil::user(&db, Role::Parent);
        let message = send_message(&db, &caller(&sender), direct(receiver.id, "hi")).unwrap();

        assert!(matches!(
            mark_message_read(&db, &caller(&bystander), message.id),
            Err(ServerError::Forbidden(_))
        ));
        mark_message_read(&db, &caller(&receiver), message.id).unwrap();
        mark_message_read(&db, &caller(&receiver), message.id).unwrap();
        assert!(db.get_chat_message(message.id).unwrap().unwrap().is_read);
    }
}
