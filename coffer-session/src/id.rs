use std::fmt;
use std::str::FromStr;

/// The identifier of a session.
///
/// A random (v4) UUID, rendered in its lowercase hyphenated form both in the
/// cookie and in the backend key. Treat it as opaque.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a new random identifier using the random number generator
    /// provided by the underlying operating system.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn inner(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

/// Returned when a string is not a session identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session identifier")]
pub struct InvalidSessionId;

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    /// Only the 36-character hyphenated form is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 36 {
            return Err(InvalidSessionId);
        }
        uuid::Uuid::parse_str(s).map(Self).map_err(|_| InvalidSessionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(SessionId::random(), SessionId::random());
    }

    #[test]
    fn test_display_parse() {
        let id = SessionId::random();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.parse::<SessionId>().unwrap(), id);
        assert_eq!(id.inner().get_version_num(), 4);
    }

    #[test]
    fn test_rejects_other_forms() {
        assert!("".parse::<SessionId>().is_err());
        assert!("not-a-session".parse::<SessionId>().is_err());
        assert!("../../etc/passwd".parse::<SessionId>().is_err());
        // Simple (unhyphenated) form.
        assert!(
            "67e5504410b1426f9247bb680e5fe0c8"
                .parse::<SessionId>()
                .is_err()
        );
        assert!(
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
                .parse::<SessionId>()
                .is_ok()
        );
    }
}
