//! Ownership checks shared by the handlers.

use uuid::Uuid;

use emsu_shared::Role;
use emsu_store::{Class, Database, School, Student, Teacher};

use crate::error::ServerError;
use crate::extract::AuthenticatedPrincipal;

/// Whether `caller` is the proprietor or principal of `school`.
pub fn runs_school(caller: &AuthenticatedPrincipal, school: &School) -> bool {
    match caller.role {
        Role::Proprietor => school.proprietor_id == Some(caller.id),
        Role::Principal => school.principal_id == Some(caller.id),
        _ => false,
    }
}

/// Load `school_id` and require the caller to run it.
pub fn ensure_runs_school(db: &Database, caller: &AuthenticatedPrincipal, school_id: Uuid) -> Result<School, ServerError> {
    let school = db
        .get_school(school_id)?
        .ok_or_else(|| ServerError::NotFound("School".into()))?;
    if runs_school(caller, &school) {
        Ok(school)
    } else {
        Err(ServerError::Forbidden("not a leader of this school".into()))
    }
}

/// The caller's teacher profile; a teacher account without one cannot act
/// as staff.
pub fn teacher_profile(db: &Database, caller: &AuthenticatedPrincipal) -> Result<Teacher, ServerError> {
    caller.require(&[Role::Teacher])?;
    db.get_teacher_by_user_id(caller.id)?
        .ok_or_else(|| ServerError::Forbidden("teacher profile required".into()))
}

/// Load `class_id` and require the caller to teach at, or run, its school.
pub fn ensure_can_view_class(db: &Database, caller: &AuthenticatedPrincipal, class_id: Uuid) -> Result<Class, ServerError> {
    let class = db
        .get_class(class_id)?
        .ok_or_else(|| ServerError::NotFound("Class".into()))?;
    let allowed = match class.school_id {
        Some(school_id) if caller.role == Role::Teacher => db
            .get_teacher_by_user_id(caller.id)?
            .is_some_and(|teacher| teacher.school_id == Some(school_id)),
        Some(school_id) if caller.role.is_leadership() => db
            .get_school(school_id)?
            .is_some_and(|school| runs_school(caller, &school)),
        _ => false,
    };

    if allowed {
        Ok(class)
    } else {
        Err(ServerError::Forbidden("no access to this class".into()))
    }
}

/// Load `class_id` and require the caller to be a teacher at its school.
pub fn ensure_teaches_class(db: &Database, caller: &AuthenticatedPrincipal, class_id: Uuid) -> Result<(Teacher, Class), ServerError> {
    let teacher = teacher_profile(db, caller)?;
    let class = db
        .get_class(class_id)?
        .ok_or_else(|| ServerError::NotFound("Class".into()))?;
    if teacher.school_id.is_some() && class.school_id == teacher.school_id {
        Ok((teacher, class))
    } else {
        Err(ServerError::Forbidden("not a teacher at this class's school".into()))
    }
}

/// Students see themselves, parents their children, staff the students of
/// their own school.
pub fn ensure_can_view_student(db: &Database, caller: &AuthenticatedPrincipal, student: &Student) -> Result<(), ServerError> {
    let allowed = match caller.role {
        Role::Student => student.user_id == caller.id,
        Role::Parent => student.parent_id == Some(caller.id),
        Role::Teacher => match (db.get_teacher_by_user_id(caller.id)?, student.school_id) {
            (Some(teacher), Some(school_id)) => teacher.school_id == Some(school_id),
            _ => false,
        },
        Role::Principal | Role::Proprietor => match student.school_id {
            Some(school_id) => db
                .get_school(school_id)?
                .is_some_and(|school| runs_school(caller, &school)),
            None => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(ServerError::Forbidden("no access to this student".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_store::NewStudent;

    fn principal_of(user: &emsu_store::User) -> AuthenticatedPrincipal {
        AuthenticatedPrincipal {
            id: user.id,
            role: user.role,
        }
    }

    #[test]
    fn only_own_leaders_run_a_school() {
        let db = testutil::db();
        let owner = testutil::user(&db, Role::Proprietor);
        let head = testutil::user(&db, Role::Principal);
        let stranger = testutil::user(&db, Role::Proprietor);
        let school = testutil::school(&db, Some(owner.id), Some(head.id));

        assert!(ensure_runs_school(&db, &principal_of(&owner), school.id).is_ok());
        assert!(ensure_runs_school(&db, &principal_of(&head), school.id).is_ok());
        assert!(matches!(
            ensure_runs_school(&db, &principal_of(&stranger), school.id),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_runs_school(&db, &principal_of(&owner), Uuid::new_v4()),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn student_visibility() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let other = testutil::school(&db, None, None);
        let parent = testutil::user(&db, Role::Parent);
        let child_user = testutil::user(&db, Role::Student);
        let child = db
            .create_student(&NewStudent {
                user_id: child_user.id,
                student_number: "S-1".into(),
                school_id: Some(school.id),
                parent_id: Some(parent.id),
                ..Default::default()
            })
            .unwrap();
        let (colleague, _) = testutil::teacher(&db, school.id);
        let (outsider, _) = testutil::teacher(&db, other.id);
        let (classmate, _) = testutil::student(&db, school.id, None);

        for allowed in [&child_user, &parent, &colleague] {
            assert!(ensure_can_view_student(&db, &principal_of(allowed), &child).is_ok());
        }
        for denied in [&outsider, &classmate] {
            assert!(ensure_can_view_student(&db, &principal_of(denied), &child).is_err());
        }
    }

    #[test]
    fn class_visibility() {
        let db = testutil::db();
        let head = testutil::user(&db, Role::Principal);
        let school = testutil::school(&db, None, Some(head.id));
        let other = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (colleague, _) = testutil::teacher(&db, school.id);
        let (outsider, _) = testutil::teacher(&db, other.id);
        let (pupil, _) = testutil::student(&db, school.id, Some(class.id));
        let unprofiled = testutil::user(&db, Role::Teacher);

        assert!(ensure_can_view_class(&db, &principal_of(&head), class.id).is_ok());
        assert!(ensure_can_view_class(&db, &principal_of(&colleague), class.id).is_ok());
        for denied in [&outsider, &pupil, &unprofiled] {
            assert!(matches!(
                ensure_can_view_class(&db, &principal_of(denied), class.id),
                Err(ServerError::Forbidden(_))
            ));
        }
        assert!(matches!(
            ensure_can_view_class(&db, &principal_of(&head), Uuid::new_v4()),
            Err(ServerError::NotFound(_))
        ));

        // only teachers write to a class
        assert!(ensure_teaches_class(&db, &principal_of(&colleague), class.id).is_ok());
        assert!(ensure_teaches_class(&db, &principal_of(&head), class.id).is_err());
        assert!(ensure_teaches_class(&db, &principal_of(&outsider), class.id).is_err());
        assert!(matches!(
            ensure_teaches_class(&db, &principal_of(&unprofiled), class.id),
            Err(ServerError::Forbidden(_))
        ));
    }
}
