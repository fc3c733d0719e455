//! Demo data for a fresh database.
//!
//! Creates one school with a proprietor, principal, teacher, parent and
//! student, plus the academic structure around them, and issues a session
//! for each demo account so the API can be exercised immediately.

use chrono::{Duration, TimeZone, Utc};
use rusqlite::params;
use rust_decimal::Decimal;

use emsu_shared::{AnnouncementPriority, ChatRoomType, MemberRole, Role, Term};

use crate::database::Database;
use crate::error::Result;
use crate::models::*;

/// What [`Database::seed_demo`] created.
#[derive(Debug, Clone)]
pub struct DemoSeed {
    pub school: School,
    /// Every demo account with a freshly issued session.
    pub logins: Vec<(User, Session)>,
}

impl Database {
    /// True when no user has been registered yet.
    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", params![], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Populate the database with a small demo school. Returns `None` when
    /// the database already holds users. All or nothing: a failure part way
    /// leaves the database as it was.
    pub fn seed_demo(&self, session_ttl: Duration) -> Result<Option<DemoSeed>> {
        if !self.is_empty()? {
            tracing::info!("database not empty, skipping demo seed");
            return Ok(None);
        }

        let tx = self.conn().unchecked_transaction()?;

        let account = |email: &str, first: &str, last: &str, role: Role| {
            self.create_user(&NewUser {
                email: email.to_string(),
                password_hash: String::new(),
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
                profile_image_url: None,
                role,
            })
        };

        let proprietor = account("proprietor@emsu.demo", "Adaeze", "Okafor", Role::Proprietor)?;
        let principal = account("principal@emsu.demo", "Tunde", "Bakare", Role::Principal)?;
        let teacher_user = account("teacher@emsu.demo", "Grace", "Johnson", Role::Teacher)?;
        let parent = account("parent@emsu.demo", "Musa", "Ibrahim", Role::Parent)?;
        let student_user = account("student@emsu.demo", "Sarah", "Ibrahim", Role::Student)?;

        let school = self.create_school(&NewSchool {
            name: "E.M.S.U Demo College".into(),
            address: Some("12 Unity Road".into()),
            phone: Some("+234 800 000 0000".into()),
            email: Some("info@emsu.demo".into()),
            proprietor_id: Some(proprietor.id),
            principal_id: Some(principal.id),
        })?;

        let session = self.create_academic_session(&NewAcademicSession {
            name: "2023/2024".into(),
            start_date: Utc.with_ymd_and_hms(2023, 9, 11, 0, 0, 0).single().unwrap_or_else(Utc::now),
            end_date: Utc.with_ymd_and_hms(2024, 7, 19, 0, 0, 0).single().unwrap_or_else(Utc::now),
            school_id: school.id,
            is_active: true,
        })?;

        let class = self.create_class(&NewClass {
            name: "JSS1 Gold".into(),
            level: "Junior Secondary".into(),
            school_id: Some(school.id),
            class_teacher_id: Some(teacher_user.id),
            capacity: None,
        })?;

        let mut subjects = Vec::new();
        for (name, code) in [("Mathematics", "MTH101"), ("English Language", "ENG101"), ("Basic Science", "BSC101")] {
            subjects.push(self.create_subject(&NewSubject {
                name: name.into(),
                code: code.into(),
                description: None,
                school_id: Some(school.id),
            })?);
        }

        let teacher = self.create_teacher(&NewTeacher {
            user_id: teacher_user.id,
            staff_number: "TCH-0001".into(),
            school_id: Some(school.id),
            department: Some("Sciences".into()),
            qualification: Some("B.Sc. Ed".into()),
            hire_date: None,
        })?;
        for subject in &subjects {
            self.assign_teacher_subject(teacher.id, subject.id, class.id, Some(session.id))?;
        }

        self.create_student(&NewStudent {
            user_id: student_user.id,
            student_number: "STU-0001".into(),
            class_id: Some(class.id),
            school_id: Some(school.id),
            date_of_birth: None,
            admission_date: None,
            parent_id: Some(parent.id),
        })?;

        self.create_fee_structure(&NewFeeStructure {
            name: "Tuition Fee".into(),
            amount: Decimal::from(80_000),
            class_id: Some(class.id),
            academic_session_id: Some(session.id),
            term: Some(Term::First),
            is_optional: false,
        })?;

        self.create_announcement(&NewAnnouncement {
            title: "Welcome back".into(),
            content: "First term resumes on Monday.".into(),
            author_id: Some(principal.id),
            school_id: school.id,
            target_role: None,
            priority: AnnouncementPriority::High,
        })?;

        let room = self.create_chat_room(&NewChatRoom {
            name: "JSS1 Gold".into(),
            description: Some("Class discussion".into()),
            room_type: ChatRoomType::Class,
            school_id: Some(school.id),
            class_id: Some(class.id),
            created_by_id: Some(teacher_user.id),
        })?;
        self.join_chat_room(room.id, teacher_user.id, MemberRole::Admin)?;
        self.join_chat_room(room.id, student_user.id, MemberRole::Member)?;

        let mut logins = Vec::new();
        for user in [proprietor, principal, teacher_user, parent, student_user] {
            let session = self.create_session(user.id, session_ttl)?;
            logins.push((user, session));
        }

        tx.commit()?;

        tracing::info!(school = %school.id, "demo data seeded");
        Ok(Some(DemoSeed { school, logins }))
    }
}
