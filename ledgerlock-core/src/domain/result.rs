//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountId;

/// Core library error type
///
/// Ordinary contention never escapes a transfer call as an `Err`: the
/// protocol turns it into [`TransferOutcome::NotCompleted`]. `Contention` is
/// only observed by direct users of the lock-set helper.
///
/// [`TransferOutcome::NotCompleted`]: super::transfer::TransferOutcome::NotCompleted
#[derive(Error, Debug)]
pub enum Error {
    #[error("Timed out after {waited_ms}ms waiting for account {account}")]
    Contention { account: AccountId, waited_ms: u64 },

    #[error("Account {0} requested twice in one lock set")]
    DuplicateLock(AccountId),

    #[error("Account {0} is not held by this lock set")]
    LockNotHeld(AccountId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a successful result with context
    pub fn ok_with_context(data: T, context: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: Some(context),
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_operation_result_fail() {
        let result: OperationResult<i32> = OperationResult::fail("lock set rejected");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error, Some("lock set rejected".to_string()));
    }

    #[test]
    fn test_operation_result_with_context_serializes() {
        let mut context = HashMap::new();
        context.insert("workers".to_string(), serde_json::json!(4));
        let result = OperationResult::ok_with_context(vec![1, 2], context);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["context"]["workers"], 4);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_validation_message() {
        let err = Error::validation("amount must be positive");
        assert_eq!(err.to_string(), "Validation error: amount must be positive");
    }

    #[test]
    fn test_contention_message_names_account() {
        let err = Error::Contention {
            account: AccountId::new(2),
            waited_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 1500ms waiting for account 2"
        );
    }
}
