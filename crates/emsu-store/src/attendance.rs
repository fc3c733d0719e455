//! Daily [`Attendance`] marks.

use chrono::NaiveDate;
use rusqlite::params;
use uuid::Uuid;

use crate::codec::{date_at, enum_at, now, opt_id, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Attendance, NewAttendance};

const ATTENDANCE_COLUMNS: &str =
    "id, student_id, class_id, date, status, remarks, recorded_by, created_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Database {
    pub fn record_attendance(&self, new: &NewAttendance) -> Result<Attendance> {
        let mark = Attendance {
            id: Uuid::new_v4(),
            student_id: new.student_id,
            class_id: new.class_id,
            date: new.date,
            status: new.status,
            remarks: new.remarks.clone(),
            recorded_by: new.recorded_by,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO attendance (id, student_id, class_id, date, status, remarks,
                                     recorded_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                mark.id.to_string(),
                mark.student_id.to_string(),
                mark.class_id.to_string(),
                mark.date.format(DATE_FORMAT).to_string(),
                mark.status.as_str(),
                mark.remarks,
                opt_id(mark.recorded_by),
                ts(&mark.created_at),
            ],
        )?;
        Ok(mark)
    }

    /// A student's attendance history, most recent date first. Both bounds
    /// of the optional range are inclusive.
    pub fn list_attendance_by_student(
        &self,
        student_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Attendance>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance
             WHERE student_id = ?1
               AND (?2 IS NULL OR date >= ?2)
               AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC, rowid ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                student_id.to_string(),
                from.map(|d| d.format(DATE_FORMAT).to_string()),
                to.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
            row_to_attendance,
        )?;

        let mut marks = Vec::new();
        for row in rows {
            marks.push(row?);
        }
        Ok(marks)
    }

    /// Register for one class on one day, in recording order.
    pub fn list_attendance_by_class(&self, class_id: Uuid, date: NaiveDate) -> Result<Vec<Attendance>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance
             WHERE class_id = ?1 AND date = ?2
             ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map(
            params![class_id.to_string(), date.format(DATE_FORMAT).to_string()],
            row_to_attendance,
        )?;

        let mut marks = Vec::new();
        for row in rows {
            marks.push(row?);
        }
        Ok(marks)
    }
}

fn row_to_attendance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attendance> {
    Ok(Attendance {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        class_id: uuid_at(row, 2)?,
        date: date_at(row, 3)?,
        status: enum_at(row, 4)?,
        remarks: row.get(5)?,
        recorded_by: opt_uuid_at(row, 6)?,
        created_at: ts_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_shared::AttendanceStatus;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn history_is_newest_date_first_and_range_inclusive() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");

        for (d, status) in [
            (15, AttendanceStatus::Present),
            (17, AttendanceStatus::Late),
            (16, AttendanceStatus::Absent),
        ] {
            db.record_attendance(&NewAttendance {
                student_id: student.id,
                class_id: class.id,
                date: day(d),
                status,
                remarks: None,
                recorded_by: None,
            })
            .unwrap();
        }

        let all = db.list_attendance_by_student(student.id, None, None).unwrap();
        let dates: Vec<_> = all.iter().map(|a| a.date).collect();
        assert_eq!(dates, [day(17), day(16), day(15)]);
        assert_eq!(all[0].status, AttendanceStatus::Late);

        let ranged = db
            .list_attendance_by_student(student.id, Some(day(16)), Some(day(17)))
            .unwrap();
        assert_eq!(ranged.len(), 2);

        assert_eq!(db.list_attendance_by_class(class.id, day(16)).unwrap().len(), 1);
        assert!(db.list_attendance_by_class(class.id, day(1)).unwrap().is_empty());
    }

    #[test]
    fn student_without_marks_has_empty_history() {
        let db = testutil::db();
        let (_, student) = testutil::student(&db, None, None, "S-1");
        assert!(db.list_attendance_by_student(student.id, None, None).unwrap().is_empty());
    }
}
