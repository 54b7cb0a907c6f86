use crate::provider::CommandSpec;
use crate::security::CheckResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a queued task.
///
/// Valid edges: `Pending→Approved`, `Pending→Rejected`, `Approved→Executing`,
/// `Executing→Completed`, `Executing→Failed`. Everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for authorization.
    Pending,
    /// Authorized by the user.
    Approved,
    /// Rejected by the user. Terminal.
    Rejected,
    /// Currently executing.
    Executing,
    /// Execution finished successfully. Terminal.
    Completed,
    /// Execution failed. Terminal.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a task's command. Attached once; immutable after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExecutionResult {
    /// A result maps to `Completed` only on a clean zero exit with no error
    /// text; anything else is `Failed`.
    pub fn target_status(&self) -> TaskStatus {
        if self.exit_code == 0 && self.error.is_empty() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        }
    }
}

/// A command awaiting, or having completed, the authorization/execution
/// lifecycle. Owned exclusively by one queue instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub session_id: String,
    pub command: CommandSpec,
    pub check_result: CheckResult,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl Task {
    pub fn new(session_id: impl Into<String>, command: CommandSpec, check_result: CheckResult) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            command,
            check_result,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            result: None,
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self.status, next),
            (TaskStatus::Pending, TaskStatus::Approved)
                | (TaskStatus::Pending, TaskStatus::Rejected)
                | (TaskStatus::Approved, TaskStatus::Executing)
                | (TaskStatus::Executing, TaskStatus::Completed)
                | (TaskStatus::Executing, TaskStatus::Failed)
        )
    }

    /// Apply a transition if the edge is valid. Returns whether anything
    /// changed; an invalid edge leaves the task untouched.
    pub(crate) fn transition_status(&mut self, next: TaskStatus) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    pub(crate) fn set_result(&mut self, result: ExecutionResult) {
        self.result = Some(result);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(
            "session-1",
            CommandSpec::new("ls", vec!["-la".into()]),
            CheckResult::pass(),
        )
    }

    #[test]
    fn new_task_is_pending_with_fresh_id() {
        let a = task();
        let b = task();
        assert_eq!(a.status, TaskStatus::Pending);
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[test]
    fn valid_edges_are_accepted() {
        let mut t = task();
        assert!(t.transition_status(TaskStatus::Approved));
        assert!(t.transition_status(TaskStatus::Executing));
        assert!(t.transition_status(TaskStatus::Completed));
        assert_eq!(t.status, TaskStatus::Completed);
    }

    #[test]
    fn rejection_is_terminal() {
        let mut t = task();
        assert!(t.transition_status(TaskStatus::Rejected));
        assert!(!t.transition_status(TaskStatus::Approved));
        assert!(!t.transition_status(TaskStatus::Executing));
        assert_eq!(t.status, TaskStatus::Rejected);
    }

    #[test]
    fn invalid_edge_leaves_status_and_timestamp_unchanged() {
        let mut t = task();
        let before = t.updated_at;
        assert!(!t.transition_status(TaskStatus::Completed));
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.updated_at, before);
    }

    #[test]
    fn skipping_the_executing_state_is_rejected() {
        let mut t = task();
        t.transition_status(TaskStatus::Approved);
        assert!(!t.transition_status(TaskStatus::Completed));
        assert_eq!(t.status, TaskStatus::Approved);
    }

    #[test]
    fn result_decides_the_terminal_status() {
        let ok = ExecutionResult {
            exit_code: 0,
            output: "done".into(),
            error: String::new(),
        };
        assert_eq!(ok.target_status(), TaskStatus::Completed);

        let nonzero = ExecutionResult {
            exit_code: 2,
            ..ExecutionResult::default()
        };
        assert_eq!(nonzero.target_status(), TaskStatus::Failed);

        let errored = ExecutionResult {
            exit_code: 0,
            output: String::new(),
            error: "command not found".into(),
        };
        assert_eq!(errored.target_status(), TaskStatus::Failed);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Executing).unwrap(),
            "\"executing\""
        );
    }

    #[test]
    fn task_serde_round_trip_preserves_fields() {
        let mut t = task();
        t.transition_status(TaskStatus::Approved);
        let json = serde_json::to_string(&t).unwrap();
        let decoded: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, t.id);
        assert_eq!(decoded.status, TaskStatus::Approved);
        assert_eq!(decoded.created_at, t.created_at);
        assert_eq!(decoded.updated_at, t.updated_at);
        assert!(decoded.result.is_none());
    }

    #[test]
    fn empty_error_is_omitted_from_the_wire_format() {
        let result = ExecutionResult {
            exit_code: 0,
            output: "ok".into(),
            error: String::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));
    }
}
