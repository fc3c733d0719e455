//! Fixtures shared by the server's unit tests.

use uuid::Uuid;

use emsu_shared::Role;
use emsu_store::{
    Class, Database, NewClass, NewSchool, NewStudent, NewSubject, NewTeacher, NewUser, School,
    Student, Subject, Teacher, User,
};

pub(crate) fn db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub(crate) fn user(db: &Database, role: Role) -> User {
    db.create_user(&NewUser {
        email: format!("{}@demo.school", Uuid::new_v4().simple()),
        password_hash: "hash".into(),
        first_name: Some("Test".into()),
        last_name: Some(role.to_string()),
        profile_image_url: None,
        role,
    })
    .unwrap()
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
        name: name.into(),
        level: "Junior Secondary".into(),
        school_id: Some(school_id),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn subject(db: &Database, school_id: Uuid, name: &str) -> Subject {
    db.create_subject(&NewSubject {
        name: name.into(),
        code: format!("{name}-{}", Uuid::new_v4().simple()),
        school_id: Some(school_id),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn student(db: &Database, school_id: Uuid, class_id: Option<Uuid>) -> (User, Student) {
    let user = user(db, Role::Student);
    let student = db
        .create_student(&NewStudent {
            user_id: user.id,
            student_number: format!("S-{}", Uuid::new_v4().simple()),
            class_id,
            school_id: Some(school_id),
            ..Default::default()
        })
        .unwrap();
    (user, student)
}

pub(crate) fn teacher(db: &Database, school_id: Uuid) -> (User, Teacher) {
    let user = user(db, Role::Teacher);
    let teacher = db
        .create_teacher(&NewTeacher {
            user_id: user.id,
            staff_number: format!("T-{}", Uuid::new_v4().simple()),
            school_id: Some(school_id),
            ..Default::default()
        })
        .unwrap();
    (user, teacher)
}
