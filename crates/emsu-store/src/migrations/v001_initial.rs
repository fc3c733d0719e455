//! v001 -- Initial schema creation.
//!
//! Identity, the school hierarchy, academic records, fees, direct messages
//! and announcements.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Identity
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    email             TEXT NOT NULL UNIQUE,
    password_hash     TEXT NOT NULL,
    first_name        TEXT,
    last_name         TEXT,
    profile_image_url TEXT,
    role              TEXT NOT NULL,              -- student|teacher|parent|principal|proprietor
    is_active         INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,              -- RFC-3339
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

-- ----------------------------------------------------------------
-- Schools
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS schools (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    address       TEXT,
    phone         TEXT,
    email         TEXT,
    proprietor_id TEXT REFERENCES users(id),
    principal_id  TEXT REFERENCES users(id),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schools_proprietor ON schools(proprietor_id);
CREATE INDEX IF NOT EXISTS idx_schools_principal ON schools(principal_id);

CREATE TABLE IF NOT EXISTS academic_sessions (
    id         TEXT PRIMARY KEY NOT NULL,
    name       TEXT NOT NULL,                     -- e.g. 2023/2024
    start_date TEXT NOT NULL,
    end_date   TEXT NOT NULL,
    school_id  TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    is_active  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_academic_sessions_school ON academic_sessions(school_id);

CREATE TABLE IF NOT EXISTS classes (
    id               TEXT PRIMARY KEY NOT NULL,
    name             TEXT NOT NULL,               -- e.g. SS3 Science
    level            TEXT NOT NULL,               -- e.g. Senior Secondary
    school_id        TEXT REFERENCES schools(id) ON DELETE CASCADE,
    class_teacher_id TEXT REFERENCES users(id),
    capacity         INTEGER NOT NULL DEFAULT 40,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classes_school ON classes(school_id);

CREATE TABLE IF NOT EXISTS subjects (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    code        TEXT NOT NULL UNIQUE,
    description TEXT,
    school_id   TEXT REFERENCES schools(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subjects_school ON subjects(school_id);

-- ----------------------------------------------------------------
-- People
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS students (
    id             TEXT PRIMARY KEY NOT NULL,
    user_id        TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    student_number TEXT NOT NULL UNIQUE,
    class_id       TEXT REFERENCES classes(id) ON DELETE SET NULL,
    school_id      TEXT REFERENCES schools(id) ON DELETE SET NULL,
    date_of_birth  TEXT,
    admission_date TEXT,
    parent_id      TEXT REFERENCES users(id),
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id);
CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id);
CREATE INDEX IF NOT EXISTS idx_students_parent ON students(parent_id);

CREATE TABLE IF NOT EXISTS teachers (
    id            TEXT PRIMARY KEY NOT NULL,
    user_id       TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    staff_number  TEXT NOT NULL UNIQUE,
    school_id     TEXT REFERENCES schools(id) ON DELETE SET NULL,
    department    TEXT,
    qualification TEXT,
    hire_date     TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_teachers_school ON teachers(school_id);

CREATE TABLE IF NOT EXISTS teacher_subjects (
    id                  TEXT PRIMARY KEY NOT NULL,
    teacher_id          TEXT NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
    subject_id          TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    class_id            TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    academic_session_id TEXT REFERENCES academic_sessions(id),
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_teacher_subjects_teacher ON teacher_subjects(teacher_id);

-- ----------------------------------------------------------------
-- Academic records
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS grades (
    id                  TEXT PRIMARY KEY NOT NULL,
    student_id          TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    subject_id          TEXT NOT NULL REFERENCES subjects(id),
    teacher_id          TEXT REFERENCES teachers(id),
    academic_session_id TEXT REFERENCES academic_sessions(id),
    term                TEXT NOT NULL,            -- first|second|third
    assessment_type     TEXT NOT NULL,            -- test1, exam, ...
    score               TEXT NOT NULL,            -- decimal
    max_score           TEXT NOT NULL,            -- decimal
    status              TEXT NOT NULL DEFAULT 'draft',
    graded_at           TEXT,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id, term);

CREATE TABLE IF NOT EXISTS attendance (
    id          TEXT PRIMARY KEY NOT NULL,
    student_id  TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    class_id    TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    date        TEXT NOT NULL,                    -- YYYY-MM-DD
    status      TEXT NOT NULL,                    -- present|absent|late
    remarks     TEXT,
    recorded_by TEXT REFERENCES users(id),
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attendance_student_date ON attendance(student_id, date DESC);
CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance(class_id, date);

CREATE TABLE IF NOT EXISTS assignments (
    id          TEXT PRIMARY KEY NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    subject_id  TEXT REFERENCES subjects(id),
    class_id    TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    teacher_id  TEXT REFERENCES teachers(id),
    due_date    TEXT,
    max_score   TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assignments_class ON assignments(class_id);

CREATE TABLE IF NOT EXISTS assignment_submissions (
    id            TEXT PRIMARY KEY NOT NULL,
    assignment_id TEXT NOT NULL REFERENCES assignments(id) ON DELETE CASCADE,
    student_id    TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    content       TEXT,
    submitted_at  TEXT,
    score         TEXT,
    feedback      TEXT,
    graded_at     TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_assignment ON assignment_submissions(assignment_id);

-- ----------------------------------------------------------------
-- Fees
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS fee_structures (
    id                  TEXT PRIMARY KEY NOT NULL,
    name                TEXT NOT NULL,            -- e.g. Tuition Fee
    amount              TEXT NOT NULL,            -- decimal
    class_id            TEXT REFERENCES classes(id) ON DELETE CASCADE,
    academic_session_id TEXT REFERENCES academic_sessions(id),
    term                TEXT,
    is_optional         INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fee_structures_class ON fee_structures(class_id);

CREATE TABLE IF NOT EXISTS fee_payments (
    id               TEXT PRIMARY KEY NOT NULL,
    student_id       TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    fee_structure_id TEXT NOT NULL REFERENCES fee_structures(id) ON DELETE CASCADE,
    amount_paid      TEXT NOT NULL,               -- decimal
    payment_method   TEXT,                        -- bank_transfer, card, cash
    transaction_ref  TEXT,
    status           TEXT NOT NULL DEFAULT 'pending',
    paid_at          TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fee_payments_student ON fee_payments(student_id);

-- ----------------------------------------------------------------
-- Direct messages and announcements
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,
    sender_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    recipient_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    subject      TEXT,
    content      TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id, created_at DESC);

CREATE TABLE IF NOT EXISTS announcements (
    id          TEXT PRIMARY KEY NOT NULL,
    title       TEXT NOT NULL,
    content     TEXT NOT NULL,
    author_id   TEXT REFERENCES users(id),
    school_id   TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    target_role TEXT,                             -- NULL = every role
    priority    TEXT NOT NULL DEFAULT 'normal',
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_announcements_school ON announcements(school_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
