use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use emsu_shared::constants::NOTIFICATION_LIST_LIMIT;

use crate::codec::{enum_at, json_at, now, opt_id, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str = "id, title, content, kind, user_id, school_id, is_read, priority,
     metadata, created_at, updated_at";

impl Database {
    pub fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
        let now = now();
        let notification = Notification {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            content: new.content.clone(),
            kind: new.kind.clone(),
            user_id: new.user_id,
            school_id: new.school_id,
            is_read: false,
            priority: new.priority,
            metadata: new.metadata.clone(),
            created_at: now,
            updated_at: now,
        };

        let metadata = notification
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            "INSERT INTO notifications (id, title, content, kind, user_id, school_id, is_read,
                                        priority, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10)",
            params![
                notification.id.to_string(),
                notification.title,
                notification.content,
                notification.kind,
                notification.user_id.to_string(),
                opt_id(notification.school_id),
                notification.priority.as_str(),
                metadata,
                ts(&notification.created_at),
                ts(&notification.updated_at),
            ],
        )?;

        tracing::debug!(notification = %notification.id, user = %notification.user_id, kind = %notification.kind, "notification created");
        Ok(notification)
    }

    pub fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification = self
            .conn()
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![id.to_string()],
                row_to_notification,
            )
            .optional()?;
        Ok(notification)
    }

    /// The 50 most recent notifications of a user, newest first.
    pub fn list_notifications_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            params![user_id.to_string(), NOTIFICATION_LIST_LIMIT],
            row_to_notification,
        )?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Returns `false` when no such notification exists. Marking an already
    /// read notification leaves it untouched.
    pub fn mark_notification_read(&self, id: Uuid) -> Result<bool> {
        let exists = self.get_notification(id)?.is_some();
        if exists {
            self.conn().execute(
                "UPDATE notifications SET is_read = 1, updated_at = ?2
                 WHERE id = ?1 AND is_read = 0",
                params![id.to_string(), ts(&now())],
            )?;
        }
        Ok(exists)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        kind: row.get(3)?,
        user_id: uuid_at(row, 4)?,
        school_id: opt_uuid_at(row, 5)?,
        is_read: row.get(6)?,
        priority: enum_at(row, 7)?,
        metadata: json_at(row, 8)?,
        created_at: ts_at(row, 9)?,
        updated_at: ts_at(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::{NotificationPriority, Role};
    use serde_json::json;

    fn alert(user_id: Uuid, title: &str) -> NewNotification {
        NewNotification {
            title: title.into(),
            content: "content".into(),
            kind: "system".into(),
            user_id,
            school_id: None,
            priority: NotificationPriority::default(),
            metadata: Some(json!({ "source": "test" })),
        }
    }

    #[test]
    fn metadata_survives_storage() {
        let db = testutil::db();
        let user = testutil::user(&db, Role::Parent);
        let created = db.create_notification(&alert(user.id, "hello")).unwrap();

        let fetched = db.get_notification(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.metadata, Some(json!({ "source": "test" })));
        assert_eq!(fetched.priority, NotificationPriority::Medium);
    }

    #[test]
    fn listing_is_capped_and_newest_first() {
        let db = testutil::db();
        let user = testutil::user(&db, Role::Parent);
        for i in 0..55 {
            db.create_notification(&alert(user.id, &format!("n{i}"))).unwrap();
        }

        let listed = db.list_notifications_for_user(user.id).unwrap();
        assert_eq!(listed.len(), 50);
        assert_eq!(listed[0].title, "n54");
        assert!(db.list_notifications_for_user(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn mark_read_twice() {
        let db = testutil::db();
        let user = testutil::user(&db, Role::Parent);
        let n = db.create_notification(&alert(user.id, "hello")).unwrap();

        assert!(db.mark_notification_read(n.id).unwrap());
        let once = db.get_notification(n.id).unwrap().unwrap();
        assert!(db.mark_notification_read(n.id).unwrap());
        let twice = db.get_notification(n.id).unwrap().unwrap();

        assert!(twice.is_read);
        assert_eq!(once, twice);
        assert!(!db.mark_notification_read(Uuid::new_v4()).unwrap());
    }
}
