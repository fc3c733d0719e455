//! [`Grade`] records.
//!
//! Scores are validated on every write: `max_score` must be positive and the
//! score must lie within `0..=max_score`.

use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use emsu_shared::Term;

use crate::codec::{
    decimal_at, enum_at, now, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, ts_at, uuid_at,
};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Grade, GradeUpdate, NewGrade};

const GRADE_COLUMNS: &str = "g.id, g.student_id, g.subject_id, g.teacher_id, g.academic_session_id,
     g.term, g.assessment_type, g.score, g.max_score, g.status, g.graded_at, g.created_at";

impl Database {
    pub fn create_grade(&self, new: &NewGrade) -> Result<Grade> {
        validate_score(new.score, new.max_score)?;

        let grade = Grade {
            id: Uuid::new_v4(),
            student_id: new.student_id,
            subject_id: new.subject_id,
            teacher_id: new.teacher_id,
            academic_session_id: new.academic_session_id,
            term: new.term,
            assessment_type: new.assessment_type.clone(),
            score: new.score,
            max_score: new.max_score,
            status: new.status,
            graded_at: None,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO grades (id, student_id, subject_id, teacher_id, academic_session_id,
                                 term, assessment_type, score, max_score, status, graded_at,
                                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                grade.id.to_string(),
                grade.student_id.to_string(),
                grade.subject_id.to_string(),
                opt_id(grade.teacher_id),
                opt_id(grade.academic_session_id),
                grade.term.as_str(),
                grade.assessment_type,
                grade.score.to_string(),
                grade.max_score.to_string(),
                grade.status.as_str(),
                opt_ts(grade.graded_at.as_ref()),
                ts(&grade.created_at),
            ],
        )?;

        tracing::debug!(grade = %grade.id, student = %grade.student_id, "grade recorded");
        Ok(grade)
    }

    pub fn get_grade(&self, id: Uuid) -> Result<Option<Grade>> {
        let grade = self
            .conn()
            .query_row(
                &format!("SELECT {GRADE_COLUMNS} FROM grades g WHERE g.id = ?1"),
                params![id.to_string()],
                row_to_grade,
            )
            .optional()?;
        Ok(grade)
    }

    /// Apply the supplied fields and re-validate the resulting score.
    pub fn update_grade(&self, id: Uuid, update: &GradeUpdate) -> Result<Grade> {
        let mut grade = self.get_grade(id)?.ok_or(StoreError::NotFound)?;

        if let Some(term) = update.term {
            grade.term = term;
        }
        if let Some(assessment_type) = &update.assessment_type {
            grade.assessment_type = assessment_type.clone();
        }
        if let Some(score) = update.score {
            grade.score = score;
        }
        if let Some(max_score) = update.max_score {
            grade.max_score = max_score;
        }
        if let Some(status) = update.status {
            grade.status = status;
        }
        if let Some(graded_at) = update.graded_at {
            grade.graded_at = Some(graded_at);
        }
        validate_score(grade.score, grade.max_score)?;

        self.conn().execute(
            "UPDATE grades
             SET term = ?2, assessment_type = ?3, score = ?4, max_score = ?5, status = ?6,
                 graded_at = ?7
             WHERE id = ?1",
            params![
                grade.id.to_string(),
                grade.term.as_str(),
                grade.assessment_type,
                grade.score.to_string(),
                grade.max_score.to_string(),
                grade.status.as_str(),
                opt_ts(grade.graded_at.as_ref()),
            ],
        )?;
        Ok(grade)
    }

    /// A student's grades, newest first, optionally limited to one term.
    pub fn list_grades_by_student(&self, student_id: Uuid, term: Option<Term>) -> Result<Vec<Grade>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades g
             WHERE g.student_id = ?1 AND (?2 IS NULL OR g.term = ?2)
             ORDER BY g.created_at DESC, g.rowid DESC"
        ))?;
        let rows = stmt.query_map(
            params![student_id.to_string(), term.map(|t| t.as_str())],
            row_to_grade,
        )?;

        let mut grades = Vec::new();
        for row in rows {
            grades.push(row?);
        }
        Ok(grades)
    }

    /// Grade sheet of one subject in one class for a term, ordered by
    /// student number.
    pub fn list_grades_by_class(&self, class_id: Uuid, subject_id: Uuid, term: Term) -> Result<Vec<Grade>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades g
             JOIN students st ON st.id = g.student_id
             WHERE st.class_id = ?1 AND g.subject_id = ?2 AND g.term = ?3
             ORDER BY st.student_number ASC, g.rowid ASC"
        ))?;
        let rows = stmt.query_map(
            params![class_id.to_string(), subject_id.to_string(), term.as_str()],
            row_to_grade,
        )?;

        let mut grades = Vec::new();
        for row in rows {
            grades.push(row?);
        }
        Ok(grades)
    }
}

fn validate_score(score: Decimal, max_score: Decimal) -> Result<()> {
    if max_score <= Decimal::ZERO {
        return Err(StoreError::Validation("maxScore must be positive".into()));
    }
    if score < Decimal::ZERO || score > max_score {
        return Err(StoreError::Validation(format!(
            "score {score} is outside 0..={max_score}"
        )));
    }
    Ok(())
}

fn row_to_grade(row: &rusqlite::Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        subject_id: uuid_at(row, 2)?,
        teacher_id: opt_uuid_at(row, 3)?,
        academic_session_id: opt_uuid_at(row, 4)?,
        term: enum_at(row, 5)?,
        assessment_type: row.get(6)?,
        score: decimal_at(row, 7)?,
        max_score: decimal_at(row, 8)?,
        status: enum_at(row, 9)?,
        graded_at: opt_ts_at(row, 10)?,
        created_at: ts_at(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::GradeStatus;

    fn new_grade(student_id: Uuid, subject_id: Uuid, term: Term, score: i64, max: i64) -> NewGrade {
        NewGrade {
            student_id,
            subject_id,
            teacher_id: None,
            academic_session_id: None,
            term,
            assessment_type: "test1".into(),
            score: Decimal::from(score),
            max_score: Decimal::from(max),
            status: GradeStatus::default(),
        }
    }

    #[test]
    fn score_bounds_are_enforced() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let maths = testutil::subject(&db, school.id, "Mathematics");
        let (_, student) = testutil::student(&db, Some(school.id), None, "S-1");

        for (score, max) in [(101, 100), (-1, 100), (0, 0)] {
            let err = db
                .create_grade(&new_grade(student.id, maths.id, Term::First, score, max))
                .unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{score}/{max}");
        }

        let edge = db
            .create_grade(&new_grade(student.id, maths.id, Term::First, 100, 100))
            .unwrap();
        assert_eq!(edge.status, GradeStatus::Draft);
        assert_eq!(db.get_grade(edge.id).unwrap(), Some(edge));
    }

    #[test]
    fn update_revalidates_against_stored_max() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let maths = testutil::subject(&db, school.id, "Mathematics");
        let (_, student) = testutil::student(&db, Some(school.id), None, "S-1");
        let grade = db
            .create_grade(&new_grade(student.id, maths.id, Term::First, 40, 50))
            .unwrap();

        let err = db
            .update_grade(
                grade.id,
                &GradeUpdate {
                    score: Some(Decimal::from(60)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let published = db
            .update_grade(
                grade.id,
                &GradeUpdate {
                    score: Some(Decimal::new(455, 1)),
                    status: Some(GradeStatus::Published),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(published.score, Decimal::new(455, 1));
        assert_eq!(published.assessment_type, "test1");
        assert_eq!(db.get_grade(grade.id).unwrap(), Some(published));

        assert!(matches!(
            db.update_grade(Uuid::new_v4(), &GradeUpdate::default()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn student_grades_filter_by_term_newest_first() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let maths = testutil::subject(&db, school.id, "Mathematics");
        let (_, student) = testutil::student(&db, Some(school.id), None, "S-1");

        let a = db.create_grade(&new_grade(student.id, maths.id, Term::First, 10, 20)).unwrap();
        let b = db.create_grade(&new_grade(student.id, maths.id, Term::First, 15, 20)).unwrap();
        db.create_grade(&new_grade(student.id, maths.id, Term::Second, 18, 20)).unwrap();

        let first: Vec<_> = db
            .list_grades_by_student(student.id, Some(Term::First))
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(first, [b.id, a.id]);
        assert_eq!(db.list_grades_by_student(student.id, None).unwrap().len(), 3);
        assert!(db.list_grades_by_student(Uuid::new_v4(), None).unwrap().is_empty());
    }

    #[test]
    fn class_sheet_orders_by_student_number() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let maths = testutil::subject(&db, school.id, "Mathematics");
        let (_, late) = testutil::student(&db, Some(school.id), Some(class.id), "S-2");
        let (_, early) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");

        db.create_grade(&new_grade(late.id, maths.id, Term::First, 10, 20)).unwrap();
        db.create_grade(&new_grade(early.id, maths.id, Term::First, 12, 20)).unwrap();

        let sheet = db.list_grades_by_class(class.id, maths.id, Term::First).unwrap();
        let students: Vec<_> = sheet.iter().map(|g| g.student_id).collect();
        assert_eq!(students, [early.id, late.id]);
        assert!(db
            .list_grades_by_class(class.id, maths.id, Term::Third)
            .unwrap()
            .is_empty());
    }
}
