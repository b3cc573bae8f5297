use std::fmt;

/// Maximum length of a logical database name.
pub const MAX_DATABASE_NAME_LENGTH: usize = 100;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyInput,
    TooLong { max: usize, actual: usize },
    InvalidCharacter(char),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyInput => write!(f, "Database name must not be empty"),
            ValidationError::TooLong { max, actual } => {
                write!(f, "Database name length {} exceeds maximum of {}", actual, max)
            }
            ValidationError::InvalidCharacter(c) => write!(
                f,
                "Database name contains invalid character {:?}; only letters, numbers, underscore, or hyphen are allowed",
                c
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a logical database name.
///
/// Valid names:
/// - Are between 1 and 100 characters
/// - Contain only ASCII letters, digits, underscores, and hyphens
pub fn validate_database_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let length = name.chars().count();
    if length > MAX_DATABASE_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            max: MAX_DATABASE_NAME_LENGTH,
            actual: length,
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ValidationError::InvalidCharacter(bad));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_database_name("alpha").is_ok());
        assert!(validate_database_name("db1").is_ok());
        assert!(validate_database_name("my_db-2").is_ok());
        assert!(validate_database_name("_").is_ok());
        assert!(validate_database_name("-").is_ok());
        assert!(validate_database_name("ABC_def-123").is_ok());
    }

    #[test]
    fn test_name_empty() {
        assert_eq!(validate_database_name(""), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn test_name_whitespace_only() {
        assert_eq!(validate_database_name("   "), Err(ValidationError::EmptyInput));
        assert_eq!(validate_database_name("\t\n"), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn test_name_length_boundary() {
        let max = "a".repeat(100);
        assert!(validate_database_name(&max).is_ok());

        let too_long = "a".repeat(101);
        assert_eq!(
            validate_database_name(&too_long),
            Err(ValidationError::TooLong { max: 100, actual: 101 })
        );
    }

    #[test]
    fn test_name_with_invalid_characters() {
        assert_eq!(
            validate_database_name("my db"),
            Err(ValidationError::InvalidCharacter(' '))
        );
        assert!(validate_database_name("my.db").is_err());
        assert!(validate_database_name("my;db").is_err());
        assert!(validate_database_name("db/../x").is_err());
        assert!(validate_database_name(" padded").is_err());
        assert!(validate_database_name("café").is_err());
    }
}
