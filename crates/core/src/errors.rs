use std::fmt;

use thiserror::Error;

/// Input that the chat or registration flow refuses before any external call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid registration: {field} {reason}")]
    InvalidRegistration { field: &'static str, reason: &'static str },
    #[error("invalid chat message: {field} {reason}")]
    InvalidMessage { field: &'static str, reason: &'static str },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// The request body could not be decoded at all.
    #[error("malformed request body: {0}")]
    MalformedRequest(String),
}

/// How a failure is presented to callers. Each class carries one fixed,
/// user-safe sentence; the detailed message stays in logs and the `detail`
/// field. Collaborator failures never get here: they degrade the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Internal,
}

impl ErrorClass {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::BadRequest => "The request could not be processed. Check inputs and try again.",
            Self::Internal => "An unexpected internal error occurred.",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BadRequest => "bad request",
            Self::Internal => "internal error",
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct InterfaceError {
    pub class: ErrorClass,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        self.class.user_message()
    }
}

impl ApplicationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Domain(DomainError::InvariantViolation(_)) => ErrorClass::Internal,
            Self::Domain(_) | Self::MalformedRequest(_) => ErrorClass::BadRequest,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let class = self.class();
        let message = match self {
            Self::Domain(DomainError::InvariantViolation(message)) => message,
            other => other.to_string(),
        };
        InterfaceError { class, message, correlation_id: correlation_id.into() }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, ErrorClass};

    #[test]
    fn rejected_input_is_a_bad_request_carrying_the_field() {
        let interface = ApplicationError::from(DomainError::InvalidRegistration {
            field: "email",
            reason: "must be a valid email address",
        })
        .into_interface("req-1");

        assert_eq!(interface.class, ErrorClass::BadRequest);
        assert_eq!(interface.correlation_id, "req-1");
        assert_eq!(interface.message, "invalid registration: email must be a valid email address");
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn undecodable_body_is_a_bad_request() {
        let interface = ApplicationError::MalformedRequest("missing field `user_id`".to_owned())
            .into_interface("req-2");

        assert_eq!(interface.class, ErrorClass::BadRequest);
        assert!(interface.to_string().starts_with("bad request: malformed request body"));
    }

    #[test]
    fn invariant_violation_is_internal_and_keeps_raw_message() {
        let interface =
            ApplicationError::from(DomainError::InvariantViolation("duplicate keyword".to_owned()))
                .into_interface("req-4");

        assert_eq!(interface.class, ErrorClass::Internal);
        assert_eq!(interface.message, "duplicate keyword");
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
