use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use emsu_shared::{Role, Term};
use emsu_store::fees::sum_amounts;
use emsu_store::{
    AcademicSession, Announcement, Assignment, AssignmentSubmission, Attendance, ChatMessage,
    ChatMessageView, ChatRoom, ChatRoomMember, Class, Database, FeePayment, Grade, GradeUpdate,
    Message, NewAcademicSession, NewAnnouncement, NewAssignment, NewAttendance, NewGrade,
    NewMessage, NewNotification, NewSchool, Notification, RoomSummary, School, SchoolCounts,
    SchoolUpdate, Student, User,
};

use crate::access::{
    ensure_can_view_class, ensure_can_view_student, ensure_runs_school, ensure_teaches_class,
    runs_school, teacher_profile,
};
use crate::config::ServerConfig;
use crate::dashboard::{self, Dashboard};
use crate::error::ServerError;
use crate::extract::{bearer_token, AuthenticatedPrincipal, Id, Params, Payload};
use crate::fees::{self, FeeLine, RecordPaymentRequest};
use crate::messaging::{self, CreateRoomRequest, SendMessageRequest};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.cors_origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/profile", get(get_profile))
        .route("/api/logout", post(logout))
        .route("/api/classes", get(list_classes))
        .route("/api/classes/:id/grades", get(class_grades))
        .route("/api/classes/:id/attendance", get(class_attendance))
        .route("/api/proprietor/schools", get(proprietor_schools).post(create_school))
        .route("/api/proprietor/schools/:id", patch(update_school))
        .route("/api/proprietor/analytics", get(proprietor_analytics))
        .route("/api/chat/rooms", get(list_chat_rooms).post(create_chat_room))
        .route("/api/chat/rooms/:id/join", post(join_chat_room))
        .route("/api/chat/rooms/:id/seen", post(mark_chat_room_seen))
        .route("/api/chat/messages", get(list_chat_messages).post(send_chat_message))
        .route("/api/chat/messages/:id/read", patch(mark_chat_message_read))
        .route("/api/notifications", get(list_notifications).post(create_notification))
        .route("/api/notifications/:id/read", patch(mark_notification_read))
        .route("/api/messages", get(list_messages).post(send_direct_message))
        .route("/api/messages/:id/read", patch(mark_message_read))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/grades", get(list_grades).post(create_grade))
        .route("/api/grades/:id", patch(update_grade))
        .route("/api/academic-sessions", post(create_academic_session))
        .route("/api/academic-sessions/:id/activate", post(activate_academic_session))
        .route("/api/attendance", get(list_attendance).post(record_attendance))
        .route("/api/assignments", get(list_assignments).post(create_assignment))
        .route("/api/assignments/:id/submissions", get(list_submissions).post(submit_assignment))
        .route("/api/submissions/:id/grade", patch(grade_submission))
        .route("/api/fees/breakdown", get(fee_breakdown))
        .route("/api/fees/payments", post(record_fee_payment))
        .route("/api/announcements", get(list_announcements).post(create_announcement))
        .route("/api/announcements/:id/deactivate", patch(deactivate_announcement))
        .route("/api/schools/available", get(available_schools))
        .route("/api/users/select-school", post(select_school))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::any();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatMessagesQuery {
    room_id: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentQuery {
    student_id: Option<Uuid>,
    term: Option<Term>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassGradesQuery {
    subject_id: Uuid,
    term: Option<Term>,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceQuery {
    student_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentsQuery {
    class_id: Option<Uuid>,
    student_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct SubmitAssignmentRequest {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GradeSubmissionRequest {
    score: Decimal,
    feedback: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchoolWithCounts {
    #[serde(flatten)]
    school: School,
    #[serde(flatten)]
    counts: SchoolCounts,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Analytics {
    total_schools: usize,
    total_students: i64,
    total_teachers: i64,
    total_classes: i64,
    total_revenue: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectMessageRequest {
    recipient_id: Uuid,
    subject: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectSchoolRequest {
    school_id: Uuid,
    user_id: Option<Uuid>,
}

// ─── Identity and dashboard ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_dashboard(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Dashboard>, ServerError> {
    let db = state.db.lock().await;
    let dashboard = dashboard::build(
        &db,
        &caller,
        state.config.active_term,
        state.config.placeholder_backfill,
    )?;
    Ok(Json(dashboard))
}

async fn get_profile(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<User>, ServerError> {
    let db = state.db.lock().await;
    let user = db
        .get_user(caller.id)?
        .ok_or_else(|| ServerError::NotFound("User".into()))?;
    Ok(Json(user))
}

/// Students see their own class, parents their children's classes, staff
/// every class of their school.
async fn list_classes(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Vec<Class>>, ServerError> {
    let db = state.db.lock().await;

    let class_ids: Vec<Uuid> = match caller.role {
        Role::Student => db
            .get_student_by_user_id(caller.id)?
            .and_then(|s| s.class_id)
            .into_iter()
            .collect(),
        Role::Parent => {
            let mut ids = Vec::new();
            for child in db.list_students_by_parent(caller.id)? {
                if let Some(id) = child.class_id {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            ids
        }
        Role::Teacher | Role::Principal | Role::Proprietor => {
            let classes = match db.get_school_for_user(caller.id)? {
                Some(school) => db.list_classes_by_school(school.id)?,
                None => Vec::new(),
            };
            return Ok(Json(classes));
        }
    };

    let mut classes = Vec::new();
    for id in class_ids {
        if let Some(class) = db.get_class(id)? {
            classes.push(class);
        }
    }
    Ok(Json(classes))
}

async fn logout(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, ServerError> {
    let token = bearer_token(&headers).ok_or(ServerError::Unauthorized)?;
    let db = state.db.lock().await;
    db.delete_session(token)?;
    info!(user = %caller.id, "session closed");
    Ok(SuccessResponse::ok())
}

// ─── Proprietor ───

async fn proprietor_schools(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Vec<SchoolWithCounts>>, ServerError> {
    caller.require(&[Role::Proprietor])?;
    let db = state.db.lock().await;

    let mut schools = Vec::new();
    for school in db.list_schools_by_proprietor(caller.id)? {
        let counts = db.count_school_members(school.id)?;
        schools.push(SchoolWithCounts { school, counts });
    }
    Ok(Json(schools))
}

async fn create_school(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewSchool>,
) -> Result<(StatusCode, Json<School>), ServerError> {
    caller.require(&[Role::Proprietor])?;
    if new.name.trim().is_empty() {
        return Err(ServerError::BadRequest("name is required".into()));
    }
    new.proprietor_id = Some(caller.id);

    let db = state.db.lock().await;
    let school = db.create_school(&new)?;
    info!(school = %school.id, proprietor = %caller.id, "school created");
    Ok((StatusCode::CREATED, Json(school)))
}

/// Owners only. A new principal must be an existing principal account.
async fn update_school(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
    Payload(update): Payload<SchoolUpdate>,
) -> Result<Json<School>, ServerError> {
    caller.require(&[Role::Proprietor])?;
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ServerError::BadRequest("name must not be empty".into()));
    }
    let db = state.db.lock().await;

    let school = db
        .get_school(id)?
        .ok_or_else(|| ServerError::NotFound("School".into()))?;
    if school.proprietor_id != Some(caller.id) {
        return Err(ServerError::Forbidden("not the proprietor of this school".into()));
    }
    if let Some(principal_id) = update.principal_id {
        let is_principal = db
            .get_user(principal_id)?
            .is_some_and(|user| user.role == Role::Principal);
        if !is_principal {
            return Err(ServerError::BadRequest("principalId must name a principal".into()));
        }
    }

    let school = db.update_school(id, &update)?;
    info!(school = %school.id, "school updated");
    Ok(Json(school))
}

async fn proprietor_analytics(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Analytics>, ServerError> {
    caller.require(&[Role::Proprietor])?;
    let db = state.db.lock().await;

    let schools = db.list_schools_by_proprietor(caller.id)?;
    let mut analytics = Analytics {
        total_schools: schools.len(),
        total_students: 0,
        total_teachers: 0,
        total_classes: 0,
        total_revenue: Decimal::ZERO,
    };
    for school in &schools {
        let counts = db.count_school_members(school.id)?;
        analytics.total_students += counts.student_count;
        analytics.total_teachers += counts.teacher_count;
        analytics.total_classes += counts.class_count;
        analytics.total_revenue =
            sum_amounts([analytics.total_revenue, db.total_revenue_for_school(school.id)?])?;
    }
    Ok(Json(analytics))
}

// ─── Chat ───

async fn list_chat_rooms(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<UserQuery>,
) -> Result<Json<Vec<RoomSummary>>, ServerError> {
    caller.check_self(query.user_id)?;
    let db = state.db.lock().await;
    Ok(Json(messaging::list_rooms(&db, &caller)?))
}

async fn create_chat_room(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(req): Payload<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ChatRoom>), ServerError> {
    let db = state.db.lock().await;
    let room = messaging::create_room(&db, &caller, req)?;
    info!(room = %room.id, creator = %caller.id, "chat room created");
    Ok((StatusCode::CREATED, Json(room)))
}

async fn join_chat_room(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(room_id): Id,
) -> Result<Json<ChatRoomMember>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(messaging::join_room(&db, &caller, room_id)?))
}

async fn mark_chat_room_seen(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(room_id): Id,
) -> Result<Json<SuccessResponse>, ServerError> {
    let db = state.db.lock().await;
    messaging::mark_room_seen(&db, &caller, room_id)?;
    Ok(SuccessResponse::ok())
}

async fn list_chat_messages(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<ChatMessagesQuery>,
) -> Result<Json<Vec<ChatMessageView>>, ServerError> {
    let room_id = query
        .room_id
        .ok_or_else(|| ServerError::BadRequest("roomId is required".into()))?;
    let db = state.db.lock().await;
    Ok(Json(messaging::list_messages(&db, &caller, room_id, query.limit)?))
}

async fn send_chat_message(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(req): Payload<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ServerError> {
    let db = state.db.lock().await;
    let message = messaging::send_message(&db, &caller, req)?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_chat_message_read(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(message_id): Id,
) -> Result<Json<SuccessResponse>, ServerError> {
    let db = state.db.lock().await;
    messaging::mark_message_read(&db, &caller, message_id)?;
    Ok(SuccessResponse::ok())
}

// ─── Notifications ───

async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<UserQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    caller.check_self(query.user_id)?;
    let db = state.db.lock().await;
    Ok(Json(db.list_notifications_for_user(caller.id)?))
}

/// Leaders may notify members of a school they run.
async fn create_notification(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewNotification>,
) -> Result<(StatusCode, Json<Notification>), ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;

    db.get_user(new.user_id)?
        .ok_or_else(|| ServerError::NotFound("User".into()))?;
    let school = db
        .get_school_for_user(new.user_id)?
        .filter(|school| runs_school(&caller, school))
        .ok_or_else(|| ServerError::Forbidden("recipient is outside your schools".into()))?;
    new.school_id = Some(school.id);

    let notification = db.create_notification(&new)?;
    info!(notification = %notification.id, user = %notification.user_id, "notification created");
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
) -> Result<Json<SuccessResponse>, ServerError> {
    let db = state.db.lock().await;
    let notification = db
        .get_notification(id)?
        .ok_or_else(|| ServerError::NotFound("Notification".into()))?;
    if notification.user_id != caller.id {
        return Err(ServerError::Forbidden("not your notification".into()));
    }
    db.mark_notification_read(id)?;
    Ok(SuccessResponse::ok())
}

// ─── Direct messages ───

async fn list_messages(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Vec<Message>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_messages_for_recipient(caller.id)?))
}

async fn send_direct_message(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(req): Payload<DirectMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let db = state.db.lock().await;
    db.get_user(req.recipient_id)?
        .ok_or_else(|| ServerError::NotFound("Recipient".into()))?;

    let message = db.create_message(&NewMessage {
        sender_id: caller.id,
        recipient_id: req.recipient_id,
        subject: req.subject,
        content: req.content,
    })?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_message_read(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
) -> Result<Json<SuccessResponse>, ServerError> {
    let db = state.db.lock().await;
    let message = db
        .get_message(id)?
        .ok_or_else(|| ServerError::NotFound("Message".into()))?;
    if message.recipient_id != caller.id {
        return Err(ServerError::Forbidden("not your message".into()));
    }
    db.mark_message_read(id)?;
    Ok(SuccessResponse::ok())
}

/// Both directions of the caller's exchange with another user.
async fn get_conversation(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(other): Id,
) -> Result<Json<Vec<Message>>, ServerError> {
    let db = state.db.lock().await;
    db.get_user(other)?
        .ok_or_else(|| ServerError::NotFound("User".into()))?;
    Ok(Json(db.get_conversation(caller.id, other)?))
}

// ─── Grades and sessions ───

/// The student named by `student_id`, or the caller's own profile when
/// none is given. The caller must be allowed to see them.
fn resolve_student(
    db: &Database,
    caller: &AuthenticatedPrincipal,
    student_id: Option<Uuid>,
) -> Result<Student, ServerError> {
    let student = match student_id {
        Some(id) => db.get_student(id)?,
        None if caller.role == Role::Student => db.get_student_by_user_id(caller.id)?,
        None => return Err(ServerError::BadRequest("studentId is required".into())),
    }
    .ok_or_else(|| ServerError::NotFound("Student".into()))?;

    ensure_can_view_student(db, caller, &student)?;
    Ok(student)
}

async fn list_grades(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<StudentQuery>,
) -> Result<Json<Vec<Grade>>, ServerError> {
    let db = state.db.lock().await;
    let student = resolve_student(&db, &caller, query.student_id)?;
    Ok(Json(db.list_grades_by_student(student.id, query.term)?))
}

async fn create_grade(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewGrade>,
) -> Result<(StatusCode, Json<Grade>), ServerError> {
    let db = state.db.lock().await;

    let teacher = teacher_profile(&db, &caller)?;
    resolve_student(&db, &caller, Some(new.student_id))?;
    db.get_subject(new.subject_id)?
        .ok_or_else(|| ServerError::NotFound("Subject".into()))?;
    new.teacher_id = Some(teacher.id);

    let grade = db.create_grade(&new)?;
    info!(grade = %grade.id, student = %grade.student_id, teacher = %teacher.id, "grade recorded");
    Ok((StatusCode::CREATED, Json(grade)))
}

async fn update_grade(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
    Payload(update): Payload<GradeUpdate>,
) -> Result<Json<Grade>, ServerError> {
    caller.require(&[Role::Teacher])?;
    let db = state.db.lock().await;

    let grade = db
        .get_grade(id)?
        .ok_or_else(|| ServerError::NotFound("Grade".into()))?;
    resolve_student(&db, &caller, Some(grade.student_id))?;

    let grade = db.update_grade(id, &update)?;
    info!(grade = %grade.id, "grade updated");
    Ok(Json(grade))
}

async fn create_academic_session(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(new): Payload<NewAcademicSession>,
) -> Result<(StatusCode, Json<AcademicSession>), ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;
    ensure_runs_school(&db, &caller, new.school_id)?;

    let session = db.create_academic_session(&new)?;
    info!(session = %session.id, school = %session.school_id, active = session.is_active, "academic session created");
    Ok((StatusCode::CREATED, Json(session)))
}

async fn activate_academic_session(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
) -> Result<Json<AcademicSession>, ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;

    let session = db
        .get_academic_session(id)?
        .ok_or_else(|| ServerError::NotFound("Academic session".into()))?;
    ensure_runs_school(&db, &caller, session.school_id)?;

    let session = db.activate_academic_session(id)?;
    info!(session = %session.id, school = %session.school_id, "academic session activated");
    Ok(Json(session))
}

/// Every grade of a class in one subject and term. The term defaults to the
/// configured active term.
async fn class_grades(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(class_id): Id,
    Params(query): Params<ClassGradesQuery>,
) -> Result<Json<Vec<Grade>>, ServerError> {
    let db = state.db.lock().await;
    let class = ensure_can_view_class(&db, &caller, class_id)?;
    db.get_subject(query.subject_id)?
        .ok_or_else(|| ServerError::NotFound("Subject".into()))?;

    let term = query.term.unwrap_or(state.config.active_term);
    Ok(Json(db.list_grades_by_class(class.id, query.subject_id, term)?))
}

// ─── Attendance ───

async fn record_attendance(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewAttendance>,
) -> Result<(StatusCode, Json<Attendance>), ServerError> {
    let db = state.db.lock().await;
    let (_, class) = ensure_teaches_class(&db, &caller, new.class_id)?;
    let student = db
        .get_student(new.student_id)?
        .ok_or_else(|| ServerError::NotFound("Student".into()))?;
    if student.class_id != Some(class.id) {
        return Err(ServerError::BadRequest("student is not in this class".into()));
    }
    new.recorded_by = Some(caller.id);

    let mark = db.record_attendance(&new)?;
    info!(student = %mark.student_id, class = %mark.class_id, date = %mark.date, status = %mark.status, "attendance recorded");
    Ok((StatusCode::CREATED, Json(mark)))
}

/// A student's history, optionally bounded by an inclusive date range.
async fn list_attendance(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<AttendanceQuery>,
) -> Result<Json<Vec<Attendance>>, ServerError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ServerError::BadRequest("from must not be after to".into()));
        }
    }
    let db = state.db.lock().await;
    let student = resolve_student(&db, &caller, query.student_id)?;
    Ok(Json(db.list_attendance_by_student(student.id, query.from, query.to)?))
}

/// The register of one class for one day, today by default.
async fn class_attendance(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(class_id): Id,
    Params(query): Params<DateQuery>,
) -> Result<Json<Vec<Attendance>>, ServerError> {
    let db = state.db.lock().await;
    let class = ensure_can_view_class(&db, &caller, class_id)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(db.list_attendance_by_class(class.id, date)?))
}

// ─── Assignments ───

async fn create_assignment(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewAssignment>,
) -> Result<(StatusCode, Json<Assignment>), ServerError> {
    if new.title.trim().is_empty() {
        return Err(ServerError::BadRequest("title is required".into()));
    }
    if new.max_score.is_some_and(|max| max <= Decimal::ZERO) {
        return Err(ServerError::BadRequest("maxScore must be positive".into()));
    }
    let db = state.db.lock().await;
    let (teacher, class) = ensure_teaches_class(&db, &caller, new.class_id)?;
    if let Some(subject_id) = new.subject_id {
        db.get_subject(subject_id)?
            .ok_or_else(|| ServerError::NotFound("Subject".into()))?;
    }
    new.teacher_id = Some(teacher.id);

    let assignment = db.create_assignment(&new)?;
    info!(assignment = %assignment.id, class = %class.id, teacher = %teacher.id, "assignment set");
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Staff list a class by `classId`; everyone else lists a student's class
/// the way grades are listed.
async fn list_assignments(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<AssignmentsQuery>,
) -> Result<Json<Vec<Assignment>>, ServerError> {
    let db = state.db.lock().await;
    let assignments = match query.class_id {
        Some(class_id) => {
            let class = ensure_can_view_class(&db, &caller, class_id)?;
            db.list_assignments_by_class(class.id)?
        }
        None => {
            let student = resolve_student(&db, &caller, query.student_id)?;
            db.list_assignments_for_student(student.id)?
        }
    };
    Ok(Json(assignments))
}

async fn submit_assignment(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(assignment_id): Id,
    Payload(req): Payload<SubmitAssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentSubmission>), ServerError> {
    caller.require(&[Role::Student])?;
    let db = state.db.lock().await;

    let student = db
        .get_student_by_user_id(caller.id)?
        .ok_or_else(|| ServerError::Forbidden("student profile required".into()))?;
    let assignment = db
        .get_assignment(assignment_id)?
        .ok_or_else(|| ServerError::NotFound("Assignment".into()))?;
    if student.class_id != Some(assignment.class_id) {
        return Err(ServerError::Forbidden("assignment is not set for your class".into()));
    }

    let submission = db.submit_assignment(assignment.id, student.id, req.content)?;
    info!(submission = %submission.id, assignment = %assignment.id, student = %student.id, "assignment submitted");
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn list_submissions(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(assignment_id): Id,
) -> Result<Json<Vec<AssignmentSubmission>>, ServerError> {
    let db = state.db.lock().await;
    let assignment = db
        .get_assignment(assignment_id)?
        .ok_or_else(|| ServerError::NotFound("Assignment".into()))?;
    ensure_can_view_class(&db, &caller, assignment.class_id)?;
    Ok(Json(db.list_submissions(assignment.id)?))
}

async fn grade_submission(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(submission_id): Id,
    Payload(req): Payload<GradeSubmissionRequest>,
) -> Result<Json<AssignmentSubmission>, ServerError> {
    let db = state.db.lock().await;
    let submission = db
        .get_submission(submission_id)?
        .ok_or_else(|| ServerError::NotFound("Submission".into()))?;
    let assignment = db
        .get_assignment(submission.assignment_id)?
        .ok_or_else(|| ServerError::NotFound("Assignment".into()))?;
    ensure_teaches_class(&db, &caller, assignment.class_id)?;

    let graded = db.grade_submission(submission.id, req.score, req.feedback)?;
    info!(submission = %graded.id, "submission graded");
    Ok(Json(graded))
}

// ─── Fees ───

async fn fee_breakdown(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Params(query): Params<StudentQuery>,
) -> Result<Json<Vec<FeeLine>>, ServerError> {
    let db = state.db.lock().await;
    let student = resolve_student(&db, &caller, query.student_id)?;
    Ok(Json(fees::breakdown(&db, student.id)?))
}

async fn record_fee_payment(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(req): Payload<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<FeePayment>), ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;

    let student = db
        .get_student(req.student_id)?
        .ok_or_else(|| ServerError::NotFound("Student".into()))?;
    let school_id = student
        .school_id
        .ok_or_else(|| ServerError::Forbidden("student is not enrolled in a school".into()))?;
    ensure_runs_school(&db, &caller, school_id)?;

    let payment = fees::record_payment(&db, req)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

// ─── Announcements ───

/// Leaders see every active announcement of their school; everyone else
/// sees those aimed at their role or at all roles.
async fn list_announcements(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Vec<Announcement>>, ServerError> {
    let db = state.db.lock().await;
    let Some(school) = db.get_school_for_user(caller.id)? else {
        return Ok(Json(Vec::new()));
    };
    let role = if runs_school(&caller, &school) {
        None
    } else {
        Some(caller.role)
    };
    Ok(Json(db.list_announcements_by_school(school.id, role)?))
}

async fn create_announcement(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(mut new): Payload<NewAnnouncement>,
) -> Result<(StatusCode, Json<Announcement>), ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;
    ensure_runs_school(&db, &caller, new.school_id)?;
    new.author_id = Some(caller.id);

    let announcement = db.create_announcement(&new)?;
    info!(announcement = %announcement.id, school = %announcement.school_id, "announcement posted");
    Ok((StatusCode::CREATED, Json(announcement)))
}

async fn deactivate_announcement(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Id(id): Id,
) -> Result<Json<SuccessResponse>, ServerError> {
    caller.require_leadership()?;
    let db = state.db.lock().await;
    let announcement = db
        .get_announcement(id)?
        .ok_or_else(|| ServerError::NotFound("Announcement".into()))?;
    ensure_runs_school(&db, &caller, announcement.school_id)?;

    db.deactivate_announcement(id)?;
    info!(announcement = %id, "announcement withdrawn");
    Ok(SuccessResponse::ok())
}

// ─── School selection ───

async fn available_schools(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
) -> Result<Json<Vec<School>>, ServerError> {
    let db = state.db.lock().await;
    let schools = match caller.role {
        Role::Proprietor => db.list_schools_by_proprietor(caller.id)?,
        _ => db.list_schools()?,
    };
    Ok(Json(schools))
}

async fn select_school(
    State(state): State<AppState>,
    caller: AuthenticatedPrincipal,
    Payload(req): Payload<SelectSchoolRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    caller.check_self(req.user_id)?;
    let db = state.db.lock().await;
    let school = db
        .get_school(req.school_id)?
        .ok_or_else(|| ServerError::NotFound("School".into()))?;

    match caller.role {
        Role::Student => {
            db.set_student_school(caller.id, school.id)?;
        }
        Role::Teacher => {
            db.set_teacher_school(caller.id, school.id)?;
        }
        Role::Parent => {}
        Role::Principal | Role::Proprietor => {
            return Err(ServerError::BadRequest(
                "Invalid user role for school selection".into(),
            ));
        }
    }

    info!(user = %caller.id, school = %school.id, role = %caller.role, "school selected");
    Ok(Json(SuccessResponse {
        success: true,
        message: Some("School selected successfully"),
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
