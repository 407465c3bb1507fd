//! Utilities shared by the Bleachers packages.

pub mod logger;
pub mod time;
