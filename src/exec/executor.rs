use super::runner::CommandRunner;
use crate::error::QueueError;
use crate::queue::{ExecutionResult, TaskQueue, TaskStatus};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// State-change notification emitted while driving a task. Consumers (the
/// TUI render loop) receive these instead of polling the queue file.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Drives Approved tasks to a terminal state using the process runner.
///
/// A failing underlying command is not an executor error; it lands in
/// `Failed` with its `ExecutionResult` populated. Only queue problems
/// (unknown id, invalid state, persistence) surface as errors.
pub struct TaskExecutor {
    queue: Arc<TaskQueue>,
    runner: Arc<CommandRunner>,
    events: Option<UnboundedSender<TaskEvent>>,
}

impl TaskExecutor {
    pub fn new(queue: Arc<TaskQueue>, runner: Arc<CommandRunner>) -> Self {
        Self {
            queue,
            runner,
            events: None,
        }
    }

    /// Emit `TaskEvent`s on every state change this executor drives.
    pub fn with_events(mut self, sender: UnboundedSender<TaskEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, task_id: &str, status: TaskStatus) {
        if let Some(sender) = &self.events {
            // A closed receiver only means nobody is watching anymore.
            let _ = sender.send(TaskEvent {
                task_id: task_id.to_string(),
                status,
            });
        }
    }

    /// Execute one Approved task and return its result.
    pub async fn execute_task(&self, task_id: &str) -> Result<ExecutionResult, QueueError> {
        let task = self
            .queue
            .task(task_id)
            .ok_or_else(|| QueueError::NotFound(task_id.to_string()))?;

        if !task.can_transition_to(TaskStatus::Executing) {
            return Err(QueueError::InvalidTransition {
                id: task_id.to_string(),
                from: task.status,
                to: TaskStatus::Executing,
            });
        }

        self.queue.mark_executing(task_id)?;
        self.emit(task_id, TaskStatus::Executing);

        let run = self.runner.run(&task.command).await;
        let mut result = ExecutionResult {
            exit_code: run.exit_code,
            output: run.output,
            error: run.error.unwrap_or_default(),
        };
        // An error with a zero exit code would otherwise read as success.
        if !result.error.is_empty() && result.exit_code == 0 {
            result.exit_code = 1;
        }

        let target = result.target_status();
        self.queue.set_task_result(task_id, result.clone())?;
        self.emit(task_id, target);

        debug!(task_id = %task_id, status = %target, "task executed");
        Ok(result)
    }

    /// Execute every currently-Approved task in queue order. Individual
    /// failures never abort the batch; the last queue error is retained for
    /// reporting alongside the results that were produced.
    pub async fn execute_all_approved(&self) -> (Vec<ExecutionResult>, Option<QueueError>) {
        let snapshot = self.queue.all_tasks();

        let mut results = Vec::new();
        let mut last_err = None;

        for task in snapshot {
            if task.status != TaskStatus::Approved {
                continue;
            }
            match self.execute_task(&task.id).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "task execution failed");
                    last_err = Some(err);
                }
            }
        }

        (results, last_err)
    }
}
