//! [`Assignment`]s and their [`AssignmentSubmission`]s.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{now, opt_decimal_at, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Assignment, AssignmentSubmission, NewAssignment};

const ASSIGNMENT_COLUMNS: &str =
    "a.id, a.title, a.description, a.subject_id, a.class_id, a.teacher_id, a.due_date, a.max_score, a.created_at";

impl Database {
    pub fn create_assignment(&self, new: &NewAssignment) -> Result<Assignment> {
        let assignment = Assignment {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            description: new.description.clone(),
            subject_id: new.subject_id,
            class_id: new.class_id,
            teacher_id: new.teacher_id,
            due_date: new.due_date,
            max_score: new.max_score,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO assignments (id, title, description, subject_id, class_id, teacher_id,
                                      due_date, max_score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                assignment.id.to_string(),
                assignment.title,
                assignment.description,
                opt_id(assignment.subject_id),
                assignment.class_id.to_string(),
                opt_id(assignment.teacher_id),
                opt_ts(assignment.due_date.as_ref()),
                assignment.max_score.map(|d| d.to_string()),
                ts(&assignment.created_at),
            ],
        )?;
        Ok(assignment)
    }

    pub fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        let assignment = self
            .conn()
            .query_row(
                &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments a WHERE a.id = ?1"),
                params![id.to_string()],
                row_to_assignment,
            )
            .optional()?;
        Ok(assignment)
    }

    /// Assignments set for a class, latest due date first. Undated
    /// assignments sort last.
    pub fn list_assignments_by_class(&self, class_id: Uuid) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
             WHERE a.class_id = ?1
             ORDER BY a.due_date IS NULL, a.due_date DESC, a.rowid ASC"
        ))?;
        let rows = stmt.query_map(params![class_id.to_string()], row_to_assignment)?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row?);
        }
        Ok(assignments)
    }

    /// Assignments of the class the student is enrolled in. Empty when the
    /// student has no class.
    pub fn list_assignments_for_student(&self, student_id: Uuid) -> Result<Vec<Assignment>> {
        match self.get_student(student_id)?.and_then(|s| s.class_id) {
            Some(class_id) => self.list_assignments_by_class(class_id),
            None => Ok(Vec::new()),
        }
    }

    /// Record a student's submission, stamped as submitted now.
    pub fn submit_assignment(
        &self,
        assignment_id: Uuid,
        student_id: Uuid,
        content: Option<String>,
    ) -> Result<AssignmentSubmission> {
        let now = now();
        let submission = AssignmentSubmission {
            id: Uuid::new_v4(),
            assignment_id,
            student_id,
            content,
            submitted_at: Some(now),
            score: None,
            feedback: None,
            graded_at: None,
            created_at: now,
        };

        self.conn().execute(
            "INSERT INTO assignment_submissions (id, assignment_id, student_id, content,
                                                 submitted_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                submission.id.to_string(),
                submission.assignment_id.to_string(),
                submission.student_id.to_string(),
                submission.content,
                opt_ts(submission.submitted_at.as_ref()),
                ts(&submission.created_at),
            ],
        )?;
        Ok(submission)
    }

    /// Score a submission. The score may not exceed the assignment's
    /// maximum when one is set.
    pub fn grade_submission(
        &self,
        submission_id: Uuid,
        score: rust_decimal::Decimal,
        feedback: Option<String>,
    ) -> Result<AssignmentSubmission> {
        let mut submission = self.get_submission(submission_id)?.ok_or(StoreError::NotFound)?;

        let max_score = self
            .get_assignment(submission.assignment_id)?
            .and_then(|a| a.max_score);
        if score < rust_decimal::Decimal::ZERO || max_score.is_some_and(|max| score > max) {
            return Err(StoreError::Validation("submission score out of range".into()));
        }

        submission.score = Some(score);
        submission.feedback = feedback;
        submission.graded_at = Some(now());

        self.conn().execute(
            "UPDATE assignment_submissions SET score = ?2, feedback = ?3, graded_at = ?4
             WHERE id = ?1",
            params![
                submission.id.to_string(),
                score.to_string(),
                submission.feedback,
                opt_ts(submission.graded_at.as_ref()),
            ],
        )?;
        Ok(submission)
    }

    pub fn get_submission(&self, id: Uuid) -> Result<Option<AssignmentSubmission>> {
        Ok(self.query_submissions("s.id = ?1", id)?.pop())
    }

    /// Submissions for an assignment in submission order.
    pub fn list_submissions(&self, assignment_id: Uuid) -> Result<Vec<AssignmentSubmission>> {
        self.query_submissions("s.assignment_id = ?1", assignment_id)
    }

    fn query_submissions(&self, filter: &str, id: Uuid) -> Result<Vec<AssignmentSubmission>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT s.id, s.assignment_id, s.student_id, s.content, s.submitted_at, s.score,
                    s.feedback, s.graded_at, s.created_at
             FROM assignment_submissions s
             WHERE {filter}
             ORDER BY s.created_at ASC, s.rowid ASC"
        ))?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok(AssignmentSubmission {
                id: uuid_at(row, 0)?,
                assignment_id: uuid_at(row, 1)?,
                student_id: uuid_at(row, 2)?,
                content: row.get(3)?,
                submitted_at: opt_ts_at(row, 4)?,
                score: opt_decimal_at(row, 5)?,
                feedback: row.get(6)?,
                graded_at: opt_ts_at(row, 7)?,
                created_at: ts_at(row, 8)?,
            })
        })?;

        let mut submissions = Vec::new();
        for row in rows {
            submissions.push(row?);
        }
        Ok(submissions)
    }
}

fn row_to_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        subject_id: opt_uuid_at(row, 3)?,
        class_id: uuid_at(row, 4)?,
        teacher_id: opt_uuid_at(row, 5)?,
        due_date: opt_ts_at(row, 6)?,
        max_score: opt_decimal_at(row, 7)?,
        created_at: ts_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn homework(class_id: Uuid, title: &str, due_in_days: Option<i64>) -> NewAssignment {
        NewAssignment {
            title: title.into(),
            description: None,
            subject_id: None,
            class_id,
            teacher_id: None,
            due_date: due_in_days.map(|d| crate::codec::now() + Duration::days(d)),
            max_score: Some(Decimal::from(20)),
        }
    }

    #[test]
    fn class_assignments_latest_due_first() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");

        db.create_assignment(&homework(class.id, "soon", Some(1))).unwrap();
        db.create_assignment(&homework(class.id, "undated", None)).unwrap();
        db.create_assignment(&homework(class.id, "later", Some(7))).unwrap();

        let titles: Vec<_> = db
            .list_assignments_by_class(class.id)
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, ["later", "soon", "undated"]);
    }

    #[test]
    fn student_sees_own_class_only() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let other = testutil::class(&db, school.id, "JSS2");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        let (_, unplaced) = testutil::student(&db, Some(school.id), None, "S-2");

        let mine = db.create_assignment(&homework(class.id, "mine", Some(1))).unwrap();
        db.create_assignment(&homework(other.id, "theirs", Some(1))).unwrap();

        assert_eq!(db.get_assignment(mine.id).unwrap(), Some(mine.clone()));
        assert_eq!(db.list_assignments_for_student(student.id).unwrap(), vec![mine]);
        assert!(db.list_assignments_for_student(unplaced.id).unwrap().is_empty());
    }

    #[test]
    fn submissions_are_scored_within_max() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        let assignment = db.create_assignment(&homework(class.id, "essay", Some(3))).unwrap();

        let submission = db
            .submit_assignment(assignment.id, student.id, Some("my essay".into()))
            .unwrap();
        assert!(matches!(
            db.grade_submission(submission.id, Decimal::from(25), None),
            Err(StoreError::Validation(_))
        ));

        let graded = db
            .grade_submission(submission.id, Decimal::from(18), Some("good".into()))
            .unwrap();
        assert_eq!(graded.score, Some(Decimal::from(18)));
        assert!(graded.graded_at.is_some());
        assert_eq!(db.get_submission(graded.id).unwrap(), Some(graded.clone()));
        assert_eq!(db.list_submissions(assignment.id).unwrap(), vec![graded]);
        assert!(matches!(
            db.grade_submission(Uuid::new_v4(), Decimal::ONE, None),
            Err(StoreError::NotFound)
        ));
    }
}
