//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display names must contain at least one character.
    #[error("Member name must not be empty")]
    EmptyName,

    /// Display names are a single protocol line.
    #[error("Member name must not contain line breaks: {name:?}")]
    NameContainsLineBreak { name: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        assert_eq!(
            DomainError::EmptyName.to_string(),
            "Member name must not be empty"
        );

        let err = DomainError::NameContainsLineBreak {
            name: "a\nb".to_string(),
        };
        assert!(err.to_string().contains("line breaks"));
    }
}
