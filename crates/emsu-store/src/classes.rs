//! [`Class`] and [`Subject`] records.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use emsu_shared::constants::DEFAULT_CLASS_CAPACITY;

use crate::codec::{now, opt_id, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Class, NewClass, NewSubject, Subject};

const CLASS_COLUMNS: &str = "id, name, level, school_id, class_teacher_id, capacity, created_at";
const SUBJECT_COLUMNS: &str = "id, name, code, description, school_id, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Capacity defaults to 40 seats.
    pub fn create_class(&self, new: &NewClass) -> Result<Class> {
        let capacity = new.capacity.unwrap_or(DEFAULT_CLASS_CAPACITY);
        if capacity <= 0 {
            return Err(StoreError::Validation("class capacity must be positive".into()));
        }

        let class = Class {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            level: new.level.clone(),
            school_id: new.school_id,
            class_teacher_id: new.class_teacher_id,
            capacity,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO classes (id, name, level, school_id, class_teacher_id, capacity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                class.id.to_string(),
                class.name,
                class.level,
                opt_id(class.school_id),
                opt_id(class.class_teacher_id),
                class.capacity,
                ts(&class.created_at),
            ],
        )?;
        Ok(class)
    }

    pub fn get_class(&self, id: Uuid) -> Result<Option<Class>> {
        let class = self
            .conn()
            .query_row(
                &format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?1"),
                params![id.to_string()],
                row_to_class,
            )
            .optional()?;
        Ok(class)
    }

    /// Classes of a school ordered by name.
    pub fn list_classes_by_school(&self, school_id: Uuid) -> Result<Vec<Class>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes
             WHERE school_id = ?1
             ORDER BY name ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![school_id.to_string()], row_to_class)?;

        let mut classes = Vec::new();
        for row in rows {
            classes.push(row?);
        }
        Ok(classes)
    }

    // ------------------------------------------------------------------
    // Subjects
    // ------------------------------------------------------------------

    /// Subject codes are unique across all schools.
    pub fn create_subject(&self, new: &NewSubject) -> Result<Subject> {
        let subject = Subject {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            code: new.code.clone(),
            description: new.description.clone(),
            school_id: new.school_id,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO subjects (id, name, code, description, school_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                subject.id.to_string(),
                subject.name,
                subject.code,
                subject.description,
                opt_id(subject.school_id),
                ts(&subject.created_at),
            ],
        )?;
        Ok(subject)
    }

    pub fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
        let subject = self
            .conn()
            .query_row(
                &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?1"),
                params![id.to_string()],
                row_to_subject,
            )
            .optional()?;
        Ok(subject)
    }

    /// Subjects of a school ordered by name.
    pub fn list_subjects_by_school(&self, school_id: Uuid) -> Result<Vec<Subject>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects
             WHERE school_id = ?1
             ORDER BY name ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![school_id.to_string()], row_to_subject)?;

        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(row?);
        }
        Ok(subjects)
    }
}

fn row_to_class(row: &rusqlite::Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        school_id: opt_uuid_at(row, 3)?,
        class_teacher_id: opt_uuid_at(row, 4)?,
        capacity: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}

fn row_to_subject(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        school_id: opt_uuid_at(row, 4)?,
        created_at: ts_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn capacity_defaults_to_forty() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");

        assert_eq!(class.capacity, 40);
        assert_eq!(db.get_class(class.id).unwrap(), Some(class));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let db = testutil::db();
        let err = db
            .create_class(&NewClass {
                name: "SS1".into(),
                level: "Senior Secondary".into(),
                capacity: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn classes_list_by_name_within_school() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let other = testutil::school(&db, None, None);
        testutil::class(&db, school.id, "SS3 Science");
        testutil::class(&db, school.id, "JSS1");
        testutil::class(&db, other.id, "JSS2");

        let names: Vec<_> = db
            .list_classes_by_school(school.id)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["JSS1", "SS3 Science"]);
    }

    #[test]
    fn subject_codes_are_unique() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let new = NewSubject {
            name: "Mathematics".into(),
            code: "MTH".into(),
            school_id: Some(school.id),
            ..Default::default()
        };
        let maths = db.create_subject(&new).unwrap();
        assert!(db.create_subject(&new).is_err());

        assert_eq!(db.get_subject(maths.id).unwrap(), Some(maths.clone()));
        assert_eq!(db.list_subjects_by_school(school.id).unwrap(), vec![maths]);
    }
}
