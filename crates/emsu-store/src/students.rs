//! [`Student`] profiles.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{now, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewStudent, Student};

const STUDENT_COLUMNS: &str = "st.id, st.user_id, st.student_number, st.class_id, st.school_id,
     st.date_of_birth, st.admission_date, st.parent_id, st.created_at";

impl Database {
    pub fn create_student(&self, new: &NewStudent) -> Result<Student> {
        let student = Student {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            student_number: new.student_number.clone(),
            class_id: new.class_id,
            school_id: new.school_id,
            date_of_birth: new.date_of_birth,
            admission_date: new.admission_date,
            parent_id: new.parent_id,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO students (id, user_id, student_number, class_id, school_id,
                                   date_of_birth, admission_date, parent_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                student.id.to_string(),
                student.user_id.to_string(),
                student.student_number,
                opt_id(student.class_id),
                opt_id(student.school_id),
                opt_ts(student.date_of_birth.as_ref()),
                opt_ts(student.admission_date.as_ref()),
                opt_id(student.parent_id),
                ts(&student.created_at),
            ],
        )?;

        tracing::debug!(student = %student.id, number = %student.student_number, "student enrolled");
        Ok(student)
    }

    pub fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
        self.query_one_student("st.id = ?1", id)
    }

    /// The student profile owned by a user account.
    pub fn get_student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>> {
        self.query_one_student("st.user_id = ?1", user_id)
    }

    /// Class roster ordered by student number.
    pub fn list_students_by_class(&self, class_id: Uuid) -> Result<Vec<Student>> {
        self.query_students("st.class_id = ?1", class_id)
    }

    /// Children linked to a parent account, ordered by student number.
    pub fn list_students_by_parent(&self, parent_id: Uuid) -> Result<Vec<Student>> {
        self.query_students("st.parent_id = ?1", parent_id)
    }

    /// Move the student owned by `user_id` to another school. The class
    /// assignment is dropped when the class belongs to a different school.
    pub fn set_student_school(&self, user_id: Uuid, school_id: Uuid) -> Result<Student> {
        let mut student = self
            .get_student_by_user_id(user_id)?
            .ok_or(StoreError::NotFound)?;

        if let Some(class_id) = student.class_id {
            let class_school = self.get_class(class_id)?.and_then(|c| c.school_id);
            if class_school != Some(school_id) {
                student.class_id = None;
            }
        }
        student.school_id = Some(school_id);

        self.conn().execute(
            "UPDATE students SET school_id = ?2, class_id = ?3 WHERE id = ?1",
            params![
                student.id.to_string(),
                school_id.to_string(),
                opt_id(student.class_id),
            ],
        )?;
        Ok(student)
    }

    fn query_one_student(&self, filter: &str, id: Uuid) -> Result<Option<Student>> {
        let student = self
            .conn()
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students st WHERE {filter}"),
                params![id.to_string()],
                row_to_student,
            )
            .optional()?;
        Ok(student)
    }

    fn query_students(&self, filter: &str, id: Uuid) -> Result<Vec<Student>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students st
             WHERE {filter}
             ORDER BY st.student_number ASC, st.rowid ASC"
        ))?;
        let rows = stmt.query_map(params![id.to_string()], row_to_student)?;

        let mut students = Vec::new();
        for row in rows {
            students.push(row?);
        }
        Ok(students)
    }
}

pub(crate) fn row_to_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        student_number: row.get(2)?,
        class_id: opt_uuid_at(row, 3)?,
        school_id: opt_uuid_at(row, 4)?,
        date_of_birth: opt_ts_at(row, 5)?,
        admission_date: opt_ts_at(row, 6)?,
        parent_id: opt_uuid_at(row, 7)?,
        created_at: ts_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::Role;

    #[test]
    fn lookup_by_user_and_id() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let (user, student) = testutil::student(&db, Some(school.id), None, "S-001");

        assert_eq!(db.get_student(student.id).unwrap(), Some(student.clone()));
        assert_eq!(db.get_student_by_user_id(user.id).unwrap(), Some(student));
        assert!(db.get_student_by_user_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn roster_is_sorted_by_student_number() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        for number in ["S-003", "S-001", "S-002"] {
            testutil::student(&db, Some(school.id), Some(class.id), number);
        }
        testutil::student(&db, Some(school.id), None, "S-000");

        let numbers: Vec<_> = db
            .list_students_by_class(class.id)
            .unwrap()
            .into_iter()
            .map(|s| s.student_number)
            .collect();
        assert_eq!(numbers, ["S-001", "S-002", "S-003"]);
    }

    #[test]
    fn children_of_parent() {
        let db = testutil::db();
        let parent = testutil::user(&db, Role::Parent);
        for number in ["S-2", "S-1"] {
            let child = testutil::user(&db, Role::Student);
            db.create_student(&NewStudent {
                user_id: child.id,
                student_number: number.into(),
                parent_id: Some(parent.id),
                ..Default::default()
            })
            .unwrap();
        }

        let children = db.list_students_by_parent(parent.id).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].student_number, "S-1");
    }

    #[test]
    fn switching_school_drops_foreign_class() {
        let db = testutil::db();
        let home = testutil::school(&db, None, None);
        let away = testutil::school(&db, None, None);
        let class = testutil::class(&db, home.id, "JSS1");
        let (user, _) = testutil::student(&db, Some(home.id), Some(class.id), "S-001");

        // same school keeps the class
        let kept = db.set_student_school(user.id, home.id).unwrap();
        assert_eq!(kept.class_id, Some(class.id));

        let moved = db.set_student_school(user.id, away.id).unwrap();
        assert_eq!(moved.school_id, Some(away.id));
        assert_eq!(moved.class_id, None);
        assert_eq!(db.get_student_by_user_id(user.id).unwrap(), Some(moved));
    }

    #[test]
    fn switching_school_without_profile_is_not_found() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        assert!(matches!(
            db.set_student_school(Uuid::new_v4(), school.id),
            Err(StoreError::NotFound)
        ));
    }
}
