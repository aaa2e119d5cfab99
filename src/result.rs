use serde::{Deserialize, Serialize};

/// Status id reported for every successful (or simulated) run
pub const STATUS_SUCCESS: u32 = 3;
/// Status id reported when the snippet itself faulted
pub const STATUS_ERROR: u32 = 4;

pub const NO_CODE_MESSAGE: &str = "No code to execute";
pub const COMPLETED_MESSAGE: &str = "Execution completed";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: u32,
    pub description: String,
}

impl Status {
    pub fn new(id: u32, description: &str) -> Self {
        Self {
            id,
            description: description.to_string(),
        }
    }

    pub fn success() -> Self {
        Self::new(STATUS_SUCCESS, "Success")
    }

    pub fn simulated() -> Self {
        Self::new(STATUS_SUCCESS, "Success (Simulated)")
    }

    pub fn no_code() -> Self {
        Self::new(STATUS_SUCCESS, "No Code")
    }

    pub fn completed() -> Self {
        Self::new(STATUS_SUCCESS, "Completed")
    }

    pub fn code_error() -> Self {
        Self::new(STATUS_ERROR, "Code Error")
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.id == STATUS_ERROR
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// The only artifact the engine produces
///
/// Field names on the wire are camelCase and must stay stable, the
/// consuming UI reads them directly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: String,
    pub error: String,
    pub exit_code: i32,
    /// Elapsed wall time in seconds
    pub execution_time: f64,
    /// Estimated bytes used by the run
    pub memory: u64,
    pub status: Status,
}

impl ExecutionResult {
    /// Result returned for empty or whitespace-only source
    pub fn no_code() -> Self {
        normalize(PartialResult {
            output: Some(NO_CODE_MESSAGE.to_string()),
            status: Some(Status::no_code()),
            ..Default::default()
        })
    }

    /// Success-shaped result used when an interpreter failed internally
    pub fn completed() -> Self {
        normalize(PartialResult {
            output: Some(COMPLETED_MESSAGE.to_string()),
            status: Some(Status::completed()),
            ..Default::default()
        })
    }
}

/// What an interpreter hands back before normalization
///
/// Every field is optional; `normalize` owns the defaults.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialResult {
    pub output: Option<String>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    #[serde(alias = "time")]
    pub execution_time: Option<f64>,
    pub memory: Option<u64>,
    pub status: Option<Status>,
}

impl PartialResult {
    /// Marks the result as a code error, keeping whatever output was captured
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.exit_code = Some(1);
        self.status = Some(Status::code_error());
        self
    }
}

/// Fills every unset field with its default and clamps numeric fields
pub fn normalize(partial: PartialResult) -> ExecutionResult {
    let execution_time = partial
        .execution_time
        .filter(|t| t.is_finite() && *t > 0.0)
        .unwrap_or(0.0);

    let error = partial.error.unwrap_or_default();
    let status = match partial.status {
        Some(status) if matches!(status.id, STATUS_SUCCESS | STATUS_ERROR) => status,
        Some(status) => {
            log::debug!("Replacing unknown status id {}", status.id);
            if error.is_empty() {
                Status::success()
            } else {
                Status::code_error()
            }
        }
        None => Status::default(),
    };

    ExecutionResult {
        output: partial.output.unwrap_or_default(),
        error,
        exit_code: partial
            .exit_code
            .unwrap_or(if status.is_error() { 1 } else { 0 }),
        execution_time,
        memory: partial.memory.unwrap_or(0),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_empty_partial() {
        let result = normalize(PartialResult::default());
        assert_eq!(result.output, "");
        assert_eq!(result.error, "");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.execution_time, 0.0);
        assert_eq!(result.memory, 0);
        assert_eq!(result.status, Status::success());
    }

    #[test]
    fn test_normalize_clamps_bad_time() {
        let result = normalize(PartialResult {
            execution_time: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(result.execution_time, 0.0);

        let result = normalize(PartialResult {
            execution_time: Some(-1.5),
            ..Default::default()
        });
        assert_eq!(result.execution_time, 0.0);
    }

    #[test]
    fn test_partial_accepts_time_alias() {
        let partial: PartialResult =
            serde_json::from_str(r#"{"output": "hi\n", "time": 0.25}"#).unwrap();
        let result = normalize(partial);
        assert_eq!(result.output, "hi\n");
        assert_eq!(result.execution_time, 0.25);
        assert_eq!(result.status.id, STATUS_SUCCESS);
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(ExecutionResult::no_code()).unwrap();
        let object = value.as_object().unwrap();
        for key in ["output", "error", "exitCode", "executionTime", "memory", "status"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(value["status"]["description"], "No Code");
        assert_eq!(value["status"]["id"], 3);
    }

    #[test]
    fn test_unknown_status_ids_are_replaced() {
        let partial: PartialResult = serde_json::from_str(
            r#"{"output": "x", "status": {"id": 11, "description": "Runtime Error (SIGSEGV)"}}"#,
        )
        .unwrap();
        let result = normalize(partial);
        assert_eq!(result.status, Status::success());
        assert_eq!(result.exit_code, 0);

        let result = normalize(PartialResult {
            error: Some("segfault".to_string()),
            status: Some(Status::new(6, "Compilation Error")),
            ..Default::default()
        });
        assert_eq!(result.status, Status::code_error());
        assert_eq!(result.exit_code, 1);

        let result = normalize(PartialResult {
            status: Some(Status::simulated()),
            ..Default::default()
        });
        assert_eq!(result.status, Status::simulated());
    }

    #[test]
    fn test_fail_sets_error_shape() {
        let result = normalize(
            PartialResult {
                output: Some("A\n".to_string()),
                ..Default::default()
            }
            .fail("boom"),
        );
        assert_eq!(result.output, "A\n");
        assert_eq!(result.error, "boom");
        assert_eq!(result.exit_code, 1);
        assert!(result.status.is_error());
    }
}
