//! Validated display names.

use std::fmt;

use thiserror::Error;

use crate::line::is_reserved;

/// A client's display name, unique across the roster for as long as the
/// owning session lives.
///
/// Names are compared case-sensitively and never normalised: whatever line
/// the client proposed (minus the terminator) is what everyone else sees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    /// Parses a proposed name from one line of client input.
    ///
    /// Rejects the empty string and the literal protocol tokens
    /// (`Valid`, `Invalid`, `exit`): a name equal to a handshake reply
    /// would make the reply itself ambiguous on the wire.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if is_reserved(raw) {
            return Err(NameError::Reserved(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a proposed name was refused before any uniqueness check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The proposed name was the empty string.
    #[error("name must not be empty")]
    Empty,

    /// The proposed name collides with a protocol token.
    #[error("name collides with protocol token: {0}")]
    Reserved(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_ordinary_names() {
        let name = Name::parse("alice").unwrap();
        assert_eq!(name.as_str(), "alice");
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_parse_preserves_interior_whitespace_and_case() {
        let name = Name::parse("Alice B").unwrap();
        assert_eq!(name.as_str(), "Alice B");
        assert_ne!(Name::parse("alice b").unwrap(), name);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(Name::parse(""), Err(NameError::Empty));
    }

    #[test]
    fn test_parse_rejects_protocol_tokens() {
        for token in ["Valid", "Invalid", "exit"] {
            assert_eq!(
                Name::parse(token),
                Err(NameError::Reserved(token.to_string()))
            );
        }
        // Case-sensitive: these are fine.
        assert!(Name::parse("valid").is_ok());
        assert!(Name::parse("EXIT").is_ok());
    }
}
