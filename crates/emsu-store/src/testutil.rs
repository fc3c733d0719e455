//! Fixtures for the store's unit tests.

use emsu_shared::Role;
use uuid::Uuid;

use crate::database::Database;
use crate::models::*;

pub(crate) fn db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub(crate) fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "hash".to_string(),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        profile_image_url: None,
        role,
    }
}

pub(crate) fn user(db: &Database, role: Role) -> User {
    let email = format!("{}@demo.school", Uuid::new_v4().simple());
    db.create_user(&new_user(&email, role)).unwrap()
}

pub(crate) fn school(db: &Database, proprietor_id: Option<Uuid>, principal_id: Option<Uuid>) -> School {
    db.create_school(&NewSchool {
        name: format!("School {}", Uuid::new_v4().simple()),
        proprietor_id,
        principal_id,
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn class(db: &Database, school_id: Uuid, name: &str) -> Class {
    db.create_class(&NewClass {
        name: name.to_string(),
        level: "Junior Secondary".to_string(),
        school_id: Some(school_id),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn subject(db: &Database, school_id: Uuid, name: &str) -> Subject {
    db.create_subject(&NewSubject {
        name: name.to_string(),
        code: format!("{}-{}", name, Uuid::new_v4().simple()),
        school_id: Some(school_id),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn student(
    db: &Database,
    school_id: Option<Uuid>,
    class_id: Option<Uuid>,
    number: &str,
) -> (User, Student) {
    let user = user(db, Role::Student);
    let student = db
        .create_student(&NewStudent {
            user_id: user.id,
            student_number: number.to_string(),
            class_id,
            school_id,
            ..Default::default()
        })
        .unwrap();
    (user, student)
}

pub(crate) fn teacher(db: &Database, school_id: Option<Uuid>, number: &str) -> (User, Teacher) {
    let user = user(db, Role::Teacher);
    let teacher = db
        .create_teacher(&NewTeacher {
            user_id: user.id,
            staff_number: number.to_string(),
            school_id,
            ..Default::default()
        })
        .unwrap();
    (user, teacher)
}
