use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const UNKNOWN_FAILURE: &str = "Unknown error";

/// Outcome of a single dispatched command.
///
/// Built only through [`ExecutionResult::success`] and [`ExecutionResult::failure`],
/// so `success` holds exactly when `error` is empty.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExecutionResult {
    pub command: String,          // Label of the matched command
    pub timestamp: DateTime<Utc>, // When execution finished
    pub success: bool,
    pub output: String,
    pub error: String,
}

impl ExecutionResult {
    pub fn success(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timestamp: Utc::now(),
            success: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failure(command: impl Into<String>, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = UNKNOWN_FAILURE.to_string();
        }
        Self {
            command: command.into(),
            timestamp: Utc::now(),
            success: false,
            output: String::new(),
            error,
        }
    }

    /// Same as [`failure`](Self::failure) but keeps whatever the action printed.
    pub fn failure_with_output(
        command: impl Into<String>,
        output: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            output: output.into(),
            ..Self::failure(command, error)
        }
    }
}

/// Reply sent when dispatch itself faults before an action could run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FailureReply {
    pub success: bool,
    pub error: String,
}

impl FailureReply {
    pub fn new(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = UNKNOWN_FAILURE.to_string();
        }
        Self {
            success: false,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_never_has_empty_error() {
        let result = ExecutionResult::failure("lock computer", "");
        assert!(!result.success);
        assert_eq!(result.error, UNKNOWN_FAILURE);
        assert!(result.output.is_empty());
    }

    #[test]
    fn success_has_empty_error() {
        let result = ExecutionResult::success("mute", "Volume muted/unmuted");
        assert!(result.success);
        assert!(result.error.is_empty());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let result = ExecutionResult::success("status", "ok");
        let value = serde_json::to_value(&result).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["command", "error", "output", "success", "timestamp"]);
    }

    #[test]
    fn failure_reply_shape() {
        let json = serde_json::to_string(&FailureReply::new("bad frame")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"bad frame"}"#);
    }
}
