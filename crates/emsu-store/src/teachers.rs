//! [`Teacher`] profiles and their subject assignments.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{now, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewTeacher, Teacher, TeacherSubject};

const TEACHER_COLUMNS: &str =
    "id, user_id, staff_number, school_id, department, qualification, hire_date, created_at";

impl Database {
    pub fn create_teacher(&self, new: &NewTeacher) -> Result<Teacher> {
        let teacher = Teacher {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            staff_number: new.staff_number.clone(),
            school_id: new.school_id,
            department: new.department.clone(),
            qualification: new.qualification.clone(),
            hire_date: new.hire_date,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO teachers (id, user_id, staff_number, school_id, department,
                                   qualification, hire_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                teacher.id.to_string(),
                teacher.user_id.to_string(),
                teacher.staff_number,
                opt_id(teacher.school_id),
                teacher.department,
                teacher.qualification,
                opt_ts(teacher.hire_date.as_ref()),
                ts(&teacher.created_at),
            ],
        )?;

        tracing::debug!(teacher = %teacher.id, number = %teacher.staff_number, "teacher hired");
        Ok(teacher)
    }

    pub fn get_teacher(&self, id: Uuid) -> Result<Option<Teacher>> {
        let teacher = self
            .conn()
            .query_row(
                &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?1"),
                params![id.to_string()],
                row_to_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    pub fn get_teacher_by_user_id(&self, user_id: Uuid) -> Result<Option<Teacher>> {
        let teacher = self
            .conn()
            .query_row(
                &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE user_id = ?1"),
                params![user_id.to_string()],
                row_to_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    /// Staff of a school ordered by staff number.
    pub fn list_teachers_by_school(&self, school_id: Uuid) -> Result<Vec<Teacher>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers
             WHERE school_id = ?1
             ORDER BY staff_number ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![school_id.to_string()], row_to_teacher)?;

        let mut teachers = Vec::new();
        for row in rows {
            teachers.push(row?);
        }
        Ok(teachers)
    }

    /// Move the teacher owned by `user_id` to another school.
    pub fn set_teacher_school(&self, user_id: Uuid, school_id: Uuid) -> Result<Teacher> {
        let mut teacher = self
            .get_teacher_by_user_id(user_id)?
            .ok_or(StoreError::NotFound)?;
        teacher.school_id = Some(school_id);

        self.conn().execute(
            "UPDATE teachers SET school_id = ?2 WHERE id = ?1",
            params![teacher.id.to_string(), school_id.to_string()],
        )?;
        Ok(teacher)
    }

    // ------------------------------------------------------------------
    // Subject assignments
    // ------------------------------------------------------------------

    pub fn assign_teacher_subject(
        &self,
        teacher_id: Uuid,
        subject_id: Uuid,
        class_id: Uuid,
        academic_session_id: Option<Uuid>,
    ) -> Result<TeacherSubject> {
        let assignment = TeacherSubject {
            id: Uuid::new_v4(),
            teacher_id,
            subject_id,
            class_id,
            academic_session_id,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO teacher_subjects (id, teacher_id, subject_id, class_id,
                                           academic_session_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                assignment.id.to_string(),
                assignment.teacher_id.to_string(),
                assignment.subject_id.to_string(),
                assignment.class_id.to_string(),
                opt_id(assignment.academic_session_id),
                ts(&assignment.created_at),
            ],
        )?;
        Ok(assignment)
    }

    /// Everything a teacher teaches, oldest assignment first.
    pub fn list_teacher_subjects(&self, teacher_id: Uuid) -> Result<Vec<TeacherSubject>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, teacher_id, subject_id, class_id, academic_session_id, created_at
             FROM teacher_subjects
             WHERE teacher_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![teacher_id.to_string()], |row| {
            Ok(TeacherSubject {
                id: uuid_at(row, 0)?,
                teacher_id: uuid_at(row, 1)?,
                subject_id: uuid_at(row, 2)?,
                class_id: uuid_at(row, 3)?,
                academic_session_id: opt_uuid_at(row, 4)?,
                created_at: ts_at(row, 5)?,
            })
        })?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row?);
        }
        Ok(assignments)
    }
}

fn row_to_teacher(row: &rusqlite::Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        staff_number: row.get(2)?,
        school_id: opt_uuid_at(row, 3)?,
        department: row.get(4)?,
        qualification: row.get(5)?,
        hire_date: opt_ts_at(row, 6)?,
        created_at: ts_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn staff_sorted_by_number() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        testutil::teacher(&db, Some(school.id), "T-002");
        let (user, first) = testutil::teacher(&db, Some(school.id), "T-001");

        let staff = db.list_teachers_by_school(school.id).unwrap();
        assert_eq!(staff.len(), 2);
        assert_eq!(staff[0], first);
        assert_eq!(db.get_teacher_by_user_id(user.id).unwrap(), Some(first.clone()));
        assert_eq!(db.get_teacher(first.id).unwrap(), Some(first));
    }

    #[test]
    fn staff_numbers_are_unique() {
        let db = testutil::db();
        testutil::teacher(&db, None, "T-001");
        let user = testutil::user(&db, emsu_shared::Role::Teacher);
        assert!(db
            .create_teacher(&NewTeacher {
                user_id: user.id,
                staff_number: "T-001".into(),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn subject_assignments_round_trip() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let maths = testutil::subject(&db, school.id, "Mathematics");
        let (_, teacher) = testutil::teacher(&db, Some(school.id), "T-001");

        let assigned = db
            .assign_teacher_subject(teacher.id, maths.id, class.id, None)
            .unwrap();
        assert_eq!(db.list_teacher_subjects(teacher.id).unwrap(), vec![assigned]);
    }

    #[test]
    fn moving_teacher_between_schools() {
        let db = testutil::db();
        let away = testutil::school(&db, None, None);
        let (user, _) = testutil::teacher(&db, None, "T-001");

        let moved = db.set_teacher_school(user.id, away.id).unwrap();
        assert_eq!(moved.school_id, Some(away.id));
        assert!(matches!(
            db.set_teacher_school(Uuid::new_v4(), away.id),
            Err(StoreError::NotFound)
        ));
    }
}
