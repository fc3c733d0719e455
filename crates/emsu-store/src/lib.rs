//! # emsu-store
//!
//! SQLite persistence for the E.M.S.U school-management back end.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model: schools and their academic structure, people, academic records,
//! fees, messaging, notifications and chat.

pub mod announcements;
pub mod assignments;
pub mod attendance;
pub mod chat;
pub mod classes;
pub mod database;
pub mod fees;
pub mod grades;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod schools;
pub mod seed;
pub mod students;
pub mod teachers;
pub mod users;

mod codec;
mod error;

#[cfg(test)]
mod testutil;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
