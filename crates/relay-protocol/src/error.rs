//! Codec errors.

use thiserror::Error;

/// Errors reported while decoding client lines.
///
/// Free-form text always decodes; only the private message syntax has a
/// failure mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A line started with `/[` but had no closing `]`.
    #[error("malformed private message: missing closing bracket")]
    MalformedPrivate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        assert_eq!(
            ProtocolError::MalformedPrivate.to_string(),
            "malformed private message: missing closing bracket"
        );
    }
}
