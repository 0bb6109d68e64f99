//! Domain model module declarations.

pub mod issue;
pub mod session;
pub mod transcript;
