//! Role-scoped dashboard aggregation.
//!
//! One payload per caller: identity, the school they belong to, and the
//! collections their role works with. Feeds the role has no source for can
//! be filled with sample records (see [`crate::placeholders`]); a source
//! that is merely empty stays empty.

use serde::Serialize;

use emsu_shared::{Role, Term};
use emsu_store::{
    Announcement, Assignment, Attendance, Class, Database, FeePayment, Grade, Message, School,
    Student, Subject, Teacher, TeacherSubject, User,
};

use crate::error::ServerError;
use crate::extract::AuthenticatedPrincipal;
use crate::placeholders::{self, Activity, SampleAnnouncement, SampleGrade, ScheduleEntry};

/// Either records from the store or sample records standing in for them.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Feed<L, S> {
    Live(Vec<L>),
    Sample(Vec<S>),
}

impl<L, S> Feed<L, S> {
    fn backfilled(live: Option<Vec<L>>, backfill: bool, sample: impl FnOnce() -> Vec<S>) -> Option<Self> {
        match live {
            Some(items) => Some(Feed::Live(items)),
            None if backfill => Some(Feed::Sample(sample())),
            None => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: User,
    pub school: Option<School>,
    #[serde(flatten)]
    pub view: DashboardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grades: Option<Feed<Grade, SampleGrade>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcements: Option<Feed<Announcement, SampleAnnouncement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<ScheduleEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<Activity>>,
}

/// The role-specific part of a [`Dashboard`], tagged by `view`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum DashboardView {
    Student(StudentView),
    Teacher(TeacherView),
    Principal(LeadershipView),
    Proprietor(LeadershipView),
    Base,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub student: Student,
    pub attendance: Vec<Attendance>,
    pub assignments: Vec<Assignment>,
    pub messages: Vec<Message>,
    pub fee_payments: Vec<FeePayment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherView {
    pub teacher: Teacher,
    pub classes: Vec<Class>,
    pub subjects: Vec<Subject>,
    /// Subject and class pairs this teacher is assigned to.
    pub teaching: Vec<TeacherSubject>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadershipView {
    pub classes: Vec<Class>,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
}

/// Assemble the dashboard for `caller`.
///
/// A missing user record is a 404. Missing role profiles degrade to the
/// base view; store failures abort the whole request.
pub fn build(
    db: &Database,
    caller: &AuthenticatedPrincipal,
    active_term: Term,
    backfill: bool,
) -> Result<Dashboard, ServerError> {
    let user = db
        .get_user(caller.id)?
        .ok_or_else(|| ServerError::NotFound("User".into()))?;
    let school = db.get_school_for_user(user.id)?;

    let mut grades = None;
    let mut announcements = None;

    let view = match user.role {
        Role::Student => match db.get_student_by_user_id(user.id)? {
            Some(student) => {
                grades = Some(db.list_grades_by_student(student.id, Some(active_term))?);
                DashboardView::Student(StudentView {
                    attendance: db.list_attendance_by_student(student.id, None, None)?,
                    assignments: db.list_assignments_for_student(student.id)?,
                    messages: db.list_messages_for_recipient(user.id)?,
                    fee_payments: db.list_fee_payments_by_student(student.id)?,
                    student,
                })
            }
            None => DashboardView::Base,
        },
        Role::Teacher => match db.get_teacher_by_user_id(user.id)? {
            Some(teacher) => {
                let (classes, subjects) = match &school {
                    Some(s) => (db.list_classes_by_school(s.id)?, db.list_subjects_by_school(s.id)?),
                    None => (Vec::new(), Vec::new()),
                };
                DashboardView::Teacher(TeacherView {
                    teaching: db.list_teacher_subjects(teacher.id)?,
                    teacher,
                    classes,
                    subjects,
                    messages: db.list_messages_for_recipient(user.id)?,
                })
            }
            None => DashboardView::Base,
        },
        Role::Principal | Role::Proprietor => {
            let leadership = match &school {
                Some(s) => {
                    announcements = Some(db.list_announcements_by_school(s.id, None)?);
                    LeadershipView {
                        classes: db.list_classes_by_school(s.id)?,
                        teachers: db.list_teachers_by_school(s.id)?,
                        subjects: db.list_subjects_by_school(s.id)?,
                    }
                }
                None => {
                    announcements = Some(Vec::new());
                    LeadershipView {
                        classes: Vec::new(),
                        teachers: Vec::new(),
                        subjects: Vec::new(),
                    }
                }
            };
            if user.role == Role::Principal {
                DashboardView::Principal(leadership)
            } else {
                DashboardView::Proprietor(leadership)
            }
        }
        Role::Parent => DashboardView::Base,
    };

    tracing::debug!(user = %user.id, role = %user.role, has_school = school.is_some(), "dashboard assembled");

    Ok(Dashboard {
        grades: Feed::backfilled(grades, backfill, placeholders::grades),
        announcements: Feed::backfilled(announcements, backfill, placeholders::announcements),
        schedule: backfill.then(placeholders::schedule),
        activities: backfill.then(placeholders::activities),
        user,
        school,
        view,
    })
}
