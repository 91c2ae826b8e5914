//! Utility modules.

pub mod datetime;

pub use datetime::{DateTime, DateTimeParseError};
