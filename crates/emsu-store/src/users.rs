//! [`User`] accounts and bearer [`Session`]s.

use chrono::Duration;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::codec::{enum_at, now, ts, ts_at, uuid_at};
use crate::database::Database;
use crate::error::Result;
use crate::models::{NewUser, Session, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, profile_image_url,
     role, is_active, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        let now = now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.trim().to_lowercase(),
            password_hash: new.password_hash.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            profile_image_url: new.profile_image_url.clone(),
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO users (id, email, password_hash, first_name, last_name,
                                profile_image_url, role, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.first_name,
                user.last_name,
                user.profile_image_url,
                user.role.as_str(),
                user.is_active,
                ts(&user.created_at),
                ts(&user.updated_at),
            ],
        )?;

        tracing::debug!(user = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Issue a new opaque session token for `user_id`.
    pub fn create_session(&self, user_id: Uuid, ttl: Duration) -> Result<Session> {
        let now = now();
        let session = Session {
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        };

        self.conn().execute(
            "INSERT INTO sessions (token, user_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id.to_string(),
                ts(&session.expires_at),
                ts(&session.created_at),
            ],
        )?;
        Ok(session)
    }

    /// Look up a session that has not expired yet.
    pub fn get_live_session(&self, token: &str) -> Result<Option<Session>> {
        let session = self
            .conn()
            .query_row(
                "SELECT token, user_id, expires_at, created_at
                 FROM sessions
                 WHERE token = ?1 AND expires_at > ?2",
                params![token, ts(&now())],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: uuid_at(row, 1)?,
                        expires_at: ts_at(row, 2)?,
                        created_at: ts_at(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        profile_image_url: row.get(5)?,
        role: enum_at(row, 6)?,
        is_active: row.get(7)?,
        created_at: ts_at(row, 8)?,
        updated_at: ts_at(row, 9)?,
    })
}
