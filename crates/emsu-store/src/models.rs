//! Domain model structs persisted in the SQLite database.
//!
//! Every row struct derives `Serialize` so it can be handed directly to the
//! HTTP layer; field names go out in camelCase. `New*` structs carry the
//! caller-supplied columns of an insert, `*Update` structs the optional
//! columns of a partial update.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emsu_shared::{
    AnnouncementPriority, AttendanceStatus, ChatRoomType, FeeStatus, GradeStatus, MemberRole,
    MessageType, NotificationPriority, Role, Term,
};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Opaque credential managed by the authentication service. Never sent
    /// to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
}

/// A bearer session issued by the authentication service.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Schools and academic structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub proprietor_id: Option<Uuid>,
    pub principal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchool {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub proprietor_id: Option<Uuid>,
    pub principal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub principal_id: Option<Uuid>,
}

/// Head-counts for one school.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolCounts {
    pub student_count: i64,
    pub teacher_count: i64,
    pub class_count: i64,
}

/// A school year, e.g. "2023/2024". At most one per school is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSession {
    pub id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub school_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAcademicSession {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub school_id: Uuid,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub level: String,
    pub school_id: Option<Uuid>,
    pub class_teacher_id: Option<Uuid>,
    pub capacity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub level: String,
    pub school_id: Option<Uuid>,
    pub class_teacher_id: Option<Uuid>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub school_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// Student profile linked 1:1 to a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    /// School-issued identifier; rosters sort by it.
    pub student_number: String,
    pub class_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub admission_date: Option<DateTime<Utc>>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub user_id: Uuid,
    pub student_number: String,
    pub class_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub admission_date: Option<DateTime<Utc>>,
    pub parent_id: Option<Uuid>,
}

/// Teacher profile linked 1:1 to a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: Uuid,
    pub user_id: Uuid,
    /// School-issued identifier; staff listings sort by it.
    pub staff_number: String,
    pub school_id: Option<Uuid>,
    pub department: Option<String>,
    pub qualification: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeacher {
    pub user_id: Uuid,
    pub staff_number: String,
    pub school_id: Option<Uuid>,
    pub department: Option<String>,
    pub qualification: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
}

/// "This teacher teaches this subject to this class this session."
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSubject {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub subject_id: Uuid,
    pub class_id: Uuid,
    pub academic_session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Academic records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub academic_session_id: Option<Uuid>,
    pub term: Term,
    pub assessment_type: String,
    pub score: Decimal,
    pub max_score: Decimal,
    pub status: GradeStatus,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub academic_session_id: Option<Uuid>,
    pub term: Term,
    pub assessment_type: String,
    pub score: Decimal,
    pub max_score: Decimal,
    #[serde(default)]
    pub status: GradeStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    pub term: Option<Term>,
    pub assessment_type: Option<String>,
    pub score: Option<Decimal>,
    pub max_score: Option<Decimal>,
    pub status: Option<GradeStatus>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub recorded_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
    pub class_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub title: String,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
    pub class_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSubmission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub content: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<Decimal>,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub class_id: Option<Uuid>,
    pub academic_session_id: Option<Uuid>,
    pub term: Option<Term>,
    pub is_optional: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeeStructure {
    pub name: String,
    pub amount: Decimal,
    pub class_id: Option<Uuid>,
    pub academic_session_id: Option<Uuid>,
    pub term: Option<Term>,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeePayment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub transaction_ref: Option<String>,
    pub status: FeeStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeePayment {
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub transaction_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Communication
// ---------------------------------------------------------------------------

/// A directed, single-recipient message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Option<Uuid>,
    pub school_id: Uuid,
    /// `None` addresses every role.
    pub target_role: Option<Role>,
    pub priority: AnnouncementPriority,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub author_id: Option<Uuid>,
    pub school_id: Uuid,
    pub target_role: Option<Role>,
    #[serde(default)]
    pub priority: AnnouncementPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Free-form tag: system, grade, attendance, fee, assignment, message.
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: Uuid,
    pub school_id: Option<Uuid>,
    pub is_read: bool,
    pub priority: NotificationPriority,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: Uuid,
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub room_type: ChatRoomType,
    pub school_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatRoom {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub room_type: ChatRoomType,
    pub school_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomMember {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A chat message, either in a room, direct to a receiver, or both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub content: String,
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    pub is_read: bool,
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

/// A room message joined with its sender's name parts.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    #[serde(flatten)]
    pub message: ChatMessage,
    /// Sender's first name.
    pub sender_name: Option<String>,
    pub sender_last_name: Option<String>,
}

/// One row of a user's room list.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub room_type: ChatRoomType,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "someone@demo.school".into(),
            password_hash: "secret".into(),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            profile_image_url: None,
            role: Role::Teacher,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_never_serialized() {
        let json = serde_json::to_value(user(Some("A"), Some("B"))).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "A");
        assert_eq!(json["role"], "teacher");
    }

    #[test]
    fn notification_kind_serializes_as_type() {
        let n = Notification {
            id: Uuid::new_v4(),
            title: "t".into(),
            content: "c".into(),
            kind: "message".into(),
            user_id: Uuid::new_v4(),
            school_id: None,
            is_read: false,
            priority: NotificationPriority::Medium,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(n).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["priority"], "medium");
    }
}
