//! Error types for the dashboard
//!
//! Errors are classified by where they stop:
//! - Fatal: store configuration missing at startup, the process must not continue
//! - Remote: fetch/exists/upsert failures, logged and absorbed by the workflow
//! - Input: malformed identity or numeric entry, surfaced inline to the user
//! - Workflow: an intent arrived in a state that cannot accept it

use thiserror::Error;

use crate::identity::IdentityError;
use crate::store::StoreError;
use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("No user email available")]
    MissingIdentity,

    #[error("IO error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Fatal,
    Remote,
    Input,
    Workflow,
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Configuration(_) => ErrorKind::Fatal,
            DashboardError::Store(_) | DashboardError::Io(_) => ErrorKind::Remote,
            DashboardError::Identity(_) | DashboardError::InvalidInput(_) => ErrorKind::Input,
            DashboardError::InvalidTransition { .. } | DashboardError::MissingIdentity => {
                ErrorKind::Workflow
            }
        }
    }

    /// Returns true if startup must abort
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Configuration(_) => {
                "Set SUPABASE_URL and SUPABASE_ANON_KEY, or add them to ~/.wfg-analytics/config.json"
            }
            DashboardError::Store(_) => "Check your internet connection and try again.",
            DashboardError::Identity(_) => "Enter an address like your.email@example.com.",
            DashboardError::InvalidInput(_) => "Enter a non-negative number.",
            DashboardError::InvalidTransition { .. } => "Finish or cancel the current edit first.",
            DashboardError::MissingIdentity => "Enter your email address to edit chart values.",
            DashboardError::Io(_) => "Check file permissions and disk space.",
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

/// Serializable error representation for the view layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiError {
    pub message: String,
    pub error_type: ErrorKind,
    pub recovery_suggestion: String,
}

impl From<&DashboardError> for UiError {
    fn from(err: &DashboardError) -> Self {
        UiError {
            message: err.to_string(),
            error_type: err.kind(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_is_fatal() {
        let err = DashboardError::Configuration("missing url".into());
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_identity_error_keeps_user_message() {
        let err = DashboardError::from(IdentityError::Empty);
        assert_eq!(err.to_string(), "Please enter your email address");
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_ui_error_projection() {
        let err = DashboardError::InvalidTransition {
            action: "save",
            phase: Phase::Idle,
        };
        let ui = UiError::from(&err);
        assert_eq!(ui.error_type, ErrorKind::Workflow);
        assert_eq!(ui.message, "Cannot save while idle");

        let json = serde_json::to_value(&ui).unwrap();
        assert_eq!(json["errorType"], "workflow");
        assert!(json["recoverySuggestion"].as_str().unwrap().contains("cancel"));
    }
}
