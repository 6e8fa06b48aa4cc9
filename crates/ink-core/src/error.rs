use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct InkError {
    pub code: String,
    pub message: String,
    pub location: Option<String>,
}

impl InkError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(
        code: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Attaches the content path the error was raised at, keeping an existing one.
    pub fn located(mut self, location: impl Into<String>) -> Self {
        if self.location.is_none() {
            self.location = Some(location.into());
        }
        self
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn display_joins_code_and_message() {
        let error = InkError::new("RUNTIME_DIVERT_TARGET", "Divert target doesn't exist.");
        assert_eq!(
            error.to_string(),
            "RUNTIME_DIVERT_TARGET: Divert target doesn't exist."
        );
        assert!(error.location.is_none());
    }

    #[test]
    fn located_keeps_first_location() {
        let error = InkError::with_location("E", "m", "knot.0")
            .located("other.1")
            .located("third");
        assert_eq!(error.location.as_deref(), Some("knot.0"));

        let error = InkError::new("E", "m").located("knot.2");
        assert_eq!(error.location.as_deref(), Some("knot.2"));
    }
}
