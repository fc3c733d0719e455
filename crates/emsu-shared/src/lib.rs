//! # emsu-shared
//!
//! Vocabulary shared by the E.M.S.U store and server crates: role and status
//! enums, fee status derivation, and common limits.

pub mod constants;
pub mod error;
pub mod fees;
pub mod types;

pub use error::ParseEnumError;
pub use fees::FeeStatus;
pub use types::*;
