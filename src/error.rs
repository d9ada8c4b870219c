// ABOUTME: Error types for API requests and user-facing wizard operations
// ABOUTME: Keeps transport and logical failures apart so retry policy can tell them apart

use std::fmt;

use crate::session::ClientAction;

/// Fallback message when a failed response carries no `detail`.
pub const GENERIC_FAILURE: &str = "Request failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Network failure or a non-2xx HTTP response.
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// HTTP success, but the body reported `ok:false`, a job ended in
    /// `error`, or the body did not have the expected shape.
    Logical(String),
}

impl RequestError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        RequestError::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn logical(message: impl Into<String>) -> Self {
        RequestError::Logical(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            RequestError::Transport { message, .. } => message,
            RequestError::Logical(message) => message,
        }
    }

    /// Connection-level failures and 5xx responses may succeed on a later
    /// attempt. Everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport { status: None, .. } => true,
            RequestError::Transport {
                status: Some(code), ..
            } => *code >= 500,
            RequestError::Logical(_) => false,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RequestError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    Request(RequestError),
    Validation(String),
    ServerNotChecked,
    Busy { client: String, action: ClientAction },
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WizardError::Request(err) => write!(f, "{}", err),
            WizardError::Validation(msg) => write!(f, "Validation error: {}", msg),
            WizardError::ServerNotChecked => write!(
                f,
                "Server has not been checked for the current host and user. Run a status check first"
            ),
            WizardError::Busy { client, action } => {
                write!(f, "Client {} is busy ({})", client, action)
            }
        }
    }
}

impl std::error::Error for WizardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WizardError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RequestError> for WizardError {
    fn from(err: RequestError) -> Self {
        WizardError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RequestError::transport(None, "connection reset").is_retryable());
        assert!(RequestError::transport(Some(502), "bad gateway").is_retryable());
        assert!(!RequestError::transport(Some(404), "Job not found").is_retryable());
        assert!(!RequestError::logical("ssh auth failed").is_retryable());
    }

    #[test]
    fn test_display_is_raw_message() {
        let err = RequestError::transport(Some(404), "Job not found");
        assert_eq!(err.to_string(), "Job not found");

        let wrapped: WizardError = RequestError::logical("no such client").into();
        assert_eq!(wrapped.to_string(), "no such client");
    }
}
