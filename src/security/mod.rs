pub mod sql_guard;
pub mod validation;

// Re-export key types and functions for convenient access
pub use sql_guard::{GuardError, ParsedSql, SqlGuard, DEFAULT_ROW_LIMIT};
pub use validation::{validate_database_name, ValidationError, MAX_DATABASE_NAME_LENGTH};
