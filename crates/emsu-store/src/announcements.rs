use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use emsu_shared::Role;

use crate::codec::{enum_at, now, opt_enum_at, opt_id, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Announcement, NewAnnouncement};

const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, content, author_id, school_id, target_role, priority, is_active, created_at";

impl Database {
    pub fn create_announcement(&self, new: &NewAnnouncement) -> Result<Announcement> {
        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            content: new.content.clone(),
            author_id: new.author_id,
            school_id: new.school_id,
            target_role: new.target_role,
            priority: new.priority,
            is_active: true,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO announcements (id, title, content, author_id, school_id, target_role,
                                        priority, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
            params![
                announcement.id.to_string(),
                announcement.title,
                announcement.content,
                opt_id(announcement.author_id),
                announcement.school_id.to_string(),
                announcement.target_role.map(|r| r.as_str()),
                announcement.priority.as_str(),
                ts(&announcement.created_at),
            ],
        )?;

        tracing::info!(announcement = %announcement.id, school = %announcement.school_id, "announcement posted");
        Ok(announcement)
    }

    /// Active announcements of a school, newest first. With a role, only
    /// those addressed to that role or to everyone.
    pub fn list_announcements_by_school(&self, school_id: Uuid, role: Option<Role>) -> Result<Vec<Announcement>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements
             WHERE school_id = ?1 AND is_active = 1
               AND (?2 IS NULL OR target_role IS NULL OR target_role = ?2)
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(
            params![school_id.to_string(), role.map(|r| r.as_str())],
            row_to_announcement,
        )?;

        let mut announcements = Vec::new();
        for row in rows {
            announcements.push(row?);
        }
        Ok(announcements)
    }

    pub fn get_announcement(&self, id: Uuid) -> Result<Option<Announcement>> {
        let announcement = self
            .conn()
            .query_row(
                &format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = ?1"),
                params![id.to_string()],
                row_to_announcement,
            )
            .optional()?;
        Ok(announcement)
    }

    /// Returns `false` when no such announcement exists.
    pub fn deactivate_announcement(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE announcements SET is_active = 0 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_announcement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: opt_uuid_at(row, 3)?,
        school_id: uuid_at(row, 4)?,
        target_role: opt_enum_at(row, 5)?,
        priority: enum_at(row, 6)?,
        is_active: row.get(7)?,
        created_at: ts_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::AnnouncementPriority;

    fn post(db: &Database, school_id: Uuid, title: &str, target_role: Option<Role>) -> Announcement {
        db.create_announcement(&NewAnnouncement {
            title: title.into(),
            content: "body".into(),
            author_id: None,
            school_id,
            target_role,
            priority: AnnouncementPriority::default(),
        })
        .unwrap()
    }

    #[test]
    fn role_targeting_includes_untargeted() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let everyone = post(&db, school.id, "everyone", None);
        let teachers = post(&db, school.id, "teachers", Some(Role::Teacher));
        post(&db, school.id, "parents", Some(Role::Parent));

        let for_teacher: Vec<_> = db
            .list_announcements_by_school(school.id, Some(Role::Teacher))
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(for_teacher, [teachers.id, everyone.id]);
        assert_eq!(db.list_announcements_by_school(school.id, None).unwrap().len(), 3);
    }

    #[test]
    fn deactivated_are_hidden() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let gone = post(&db, school.id, "old news", None);

        assert!(db.deactivate_announcement(gone.id).unwrap());
        assert!(db.list_announcements_by_school(school.id, None).unwrap().is_empty());
        // still reachable by id, flagged inactive
        assert_eq!(db.get_announcement(gone.id).unwrap().map(|a| a.is_active), Some(false));
        assert!(!db.deactivate_announcement(Uuid::new_v4()).unwrap());
    }
}
