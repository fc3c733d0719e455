//! CRUD operations for [`School`] and [`AcademicSession`] records.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{now, opt_id, opt_uuid_at, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AcademicSession, NewAcademicSession, NewSchool, School, SchoolCounts, SchoolUpdate};

const SCHOOL_COLUMNS: &str =
    "s.id, s.name, s.address, s.phone, s.email, s.proprietor_id, s.principal_id, s.created_at, s.updated_at";

const SESSION_COLUMNS: &str = "id, name, start_date, end_date, school_id, is_active, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Schools
    // ------------------------------------------------------------------

    pub fn create_school(&self, new: &NewSchool) -> Result<School> {
        let now = now();
        let school = School {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            address: new.address.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            proprietor_id: new.proprietor_id,
            principal_id: new.principal_id,
            created_at: now,
            updated_at: now,
        };
        self.write_school(&school, true)?;

        tracing::info!(school = %school.id, name = %school.name, "school created");
        Ok(school)
    }

    pub fn get_school(&self, id: Uuid) -> Result<Option<School>> {
        let school = self
            .conn()
            .query_row(
                &format!("SELECT {SCHOOL_COLUMNS} FROM schools s WHERE s.id = ?1"),
                params![id.to_string()],
                row_to_school,
            )
            .optional()?;
        Ok(school)
    }

    /// Apply the supplied fields. Fails with [`StoreError::NotFound`] when
    /// the school does not exist.
    pub fn update_school(&self, id: Uuid, update: &SchoolUpdate) -> Result<School> {
        let mut school = self.get_school(id)?.ok_or(StoreError::NotFound)?;

        if let Some(name) = &update.name {
            school.name = name.clone();
        }
        if let Some(address) = &update.address {
            school.address = Some(address.clone());
        }
        if let Some(phone) = &update.phone {
            school.phone = Some(phone.clone());
        }
        if let Some(email) = &update.email {
            school.email = Some(email.clone());
        }
        if let Some(principal_id) = update.principal_id {
            school.principal_id = Some(principal_id);
        }
        school.updated_at = now();

        self.write_school(&school, false)?;
        Ok(school)
    }

    /// Every school, ordered by name.
    pub fn list_schools(&self) -> Result<Vec<School>> {
        self.query_schools(
            &format!("SELECT {SCHOOL_COLUMNS} FROM schools s ORDER BY s.name ASC, s.rowid ASC"),
            &[],
        )
    }

    /// Schools owned by a proprietor, ordered by name.
    pub fn list_schools_by_proprietor(&self, proprietor_id: Uuid) -> Result<Vec<School>> {
        self.query_schools(
            &format!(
                "SELECT {SCHOOL_COLUMNS} FROM schools s
                 WHERE s.proprietor_id = ?1
                 ORDER BY s.name ASC, s.rowid ASC"
            ),
            &[&proprietor_id.to_string()],
        )
    }

    /// Resolve the school a user belongs to by trying, in order: proprietor
    /// of, principal of, employed teacher of, enrolled student of. The first
    /// match wins.
    pub fn get_school_for_user(&self, user_id: Uuid) -> Result<Option<School>> {
        let id = user_id.to_string();
        let lookups = [
            format!("SELECT {SCHOOL_COLUMNS} FROM schools s WHERE s.proprietor_id = ?1 ORDER BY s.rowid LIMIT 1"),
            format!("SELECT {SCHOOL_COLUMNS} FROM schools s WHERE s.principal_id = ?1 ORDER BY s.rowid LIMIT 1"),
            format!(
                "SELECT {SCHOOL_COLUMNS} FROM schools s
                 JOIN teachers t ON t.school_id = s.id
                 WHERE t.user_id = ?1 LIMIT 1"
            ),
            format!(
                "SELECT {SCHOOL_COLUMNS} FROM schools s
                 JOIN students st ON st.school_id = s.id
                 WHERE st.user_id = ?1 LIMIT 1"
            ),
        ];

        for sql in &lookups {
            let found = self
                .conn()
                .query_row(sql, params![id], row_to_school)
                .optional()?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    pub fn count_school_members(&self, school_id: Uuid) -> Result<SchoolCounts> {
        let counts = self.conn().query_row(
            "SELECT
                (SELECT COUNT(*) FROM students WHERE school_id = ?1),
                (SELECT COUNT(*) FROM teachers WHERE school_id = ?1),
                (SELECT COUNT(*) FROM classes  WHERE school_id = ?1)",
            params![school_id.to_string()],
            |row| {
                Ok(SchoolCounts {
                    student_count: row.get(0)?,
                    teacher_count: row.get(1)?,
                    class_count: row.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }

    fn write_school(&self, school: &School, insert: bool) -> Result<()> {
        let sql = if insert {
            "INSERT INTO schools (id, name, address, phone, email, proprietor_id, principal_id,
                                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        } else {
            "UPDATE schools
             SET name = ?2, address = ?3, phone = ?4, email = ?5, proprietor_id = ?6,
                 principal_id = ?7, created_at = ?8, updated_at = ?9
             WHERE id = ?1"
        };
        self.conn().execute(
            sql,
            params![
                school.id.to_string(),
                school.name,
                school.address,
                school.phone,
                school.email,
                opt_id(school.proprietor_id),
                opt_id(school.principal_id),
                ts(&school.created_at),
                ts(&school.updated_at),
            ],
        )?;
        Ok(())
    }

    fn query_schools(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<School>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(args, row_to_school)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Academic sessions
    // ------------------------------------------------------------------

    /// Insert a session. Rejects an end before the start, and a second
    /// active session for the same school.
    pub fn create_academic_session(&self, new: &NewAcademicSession) -> Result<AcademicSession> {
        if new.end_date <= new.start_date {
            return Err(StoreError::Validation(
                "academic session must end after it starts".into(),
            ));
        }
        if new.is_active && self.get_active_academic_session(new.school_id)?.is_some() {
            return Err(StoreError::Validation(
                "school already has an active academic session".into(),
            ));
        }

        let session = AcademicSession {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            school_id: new.school_id,
            is_active: new.is_active,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO academic_sessions (id, name, start_date, end_date, school_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.to_string(),
                session.name,
                ts(&session.start_date),
                ts(&session.end_date),
                session.school_id.to_string(),
                session.is_active,
                ts(&session.created_at),
            ],
        )?;

        tracing::info!(session = %session.id, school = %session.school_id, "academic session created");
        Ok(session)
    }

    pub fn get_academic_session(&self, id: Uuid) -> Result<Option<AcademicSession>> {
        let session = self
            .conn()
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM academic_sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_academic_session,
            )
            .optional()?;
        Ok(session)
    }

    pub fn get_active_academic_session(&self, school_id: Uuid) -> Result<Option<AcademicSession>> {
        let session = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM academic_sessions
                     WHERE school_id = ?1 AND is_active = 1
                     LIMIT 1"
                ),
                params![school_id.to_string()],
                row_to_academic_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Make `id` the only active session of its school.
    pub fn activate_academic_session(&self, id: Uuid) -> Result<AcademicSession> {
        let tx = self.conn().unchecked_transaction()?;

        let mut session = tx
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM academic_sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_academic_session,
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        tx.execute(
            "UPDATE academic_sessions SET is_active = (id = ?1) WHERE school_id = ?2",
            params![id.to_string(), session.school_id.to_string()],
        )?;
        tx.commit()?;

        session.is_active = true;
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_school(row: &rusqlite::Row<'_>) -> rusqlite::Result<School> {
    Ok(School {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        proprietor_id: opt_uuid_at(row, 5)?,
        principal_id: opt_uuid_at(row, 6)?,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
    })
}

fn row_to_academic_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<AcademicSession> {
    Ok(AcademicSession {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        start_date: ts_at(row, 2)?,
        end_date: ts_at(row, 3)?,
        school_id: uuid_at(row, 4)?,
        is_active: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}
