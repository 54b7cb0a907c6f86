use super::store::Store;
use super::task::{ExecutionResult, Task, TaskStatus};
use crate::error::QueueError;
use crate::provider::CommandSpec;
use crate::security::CheckResult;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Persistent task queue for one session's queue file.
///
/// All mutating operations are serialized by a single exclusive lock, so one
/// instance is safe for concurrent callers. The backing file has no
/// cross-process lock: independent instances pointed at the same path race,
/// and the last whole-file write wins. If persisting fails, the in-memory
/// mutation is rolled back so memory and disk stay consistent.
///
/// Tasks are never deleted; a task stuck in `Executing` after a crash stays
/// stuck (no reconciliation sweep).
#[derive(Debug)]
pub struct TaskQueue {
    session_id: String,
    store: Store,
    tasks: Mutex<Vec<Task>>,
}

impl TaskQueue {
    /// Open (or create) the queue backed by `path`. A missing file is an
    /// empty queue; malformed JSON is a hard failure.
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self, QueueError> {
        let store = Store::new(path);
        let tasks = store.load()?;
        Ok(Self {
            session_id: session_id.into(),
            store,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new Pending task and persist the whole list.
    pub fn add_task(
        &self,
        command: CommandSpec,
        check_result: CheckResult,
    ) -> Result<Task, QueueError> {
        let mut tasks = self.lock();
        let task = Task::new(self.session_id.clone(), command, check_result);
        tasks.push(task.clone());

        if let Err(err) = self.store.save(&tasks) {
            tasks.pop();
            return Err(err);
        }

        debug!(task_id = %task.id, "task queued");
        Ok(task)
    }

    pub fn approve_task(&self, task_id: &str) -> Result<(), QueueError> {
        self.transition(task_id, TaskStatus::Approved)
    }

    pub fn reject_task(&self, task_id: &str) -> Result<(), QueueError> {
        self.transition(task_id, TaskStatus::Rejected)
    }

    pub fn mark_executing(&self, task_id: &str) -> Result<(), QueueError> {
        self.transition(task_id, TaskStatus::Executing)
    }

    /// Attach an execution result and move the task to its terminal state:
    /// `Completed` on a clean zero exit, `Failed` otherwise. Errors without
    /// mutating unless the task is currently `Executing`.
    pub fn set_task_result(
        &self,
        task_id: &str,
        result: ExecutionResult,
    ) -> Result<(), QueueError> {
        let mut tasks = self.lock();
        let task = find_task_mut(&mut tasks, task_id)?;

        let target = result.target_status();
        if !task.can_transition_to(target) {
            return Err(QueueError::InvalidTransition {
                id: task_id.to_string(),
                from: task.status,
                to: target,
            });
        }

        let snapshot = task.clone();
        task.set_result(result);
        task.transition_status(target);

        if let Err(err) = self.store.save(&tasks) {
            if let Ok(task) = find_task_mut(&mut tasks, task_id) {
                *task = snapshot;
            }
            return Err(err);
        }

        debug!(task_id = %task_id, status = %target, "task finished");
        Ok(())
    }

    /// Single validated entry point for every status transition.
    fn transition(&self, task_id: &str, target: TaskStatus) -> Result<(), QueueError> {
        let mut tasks = self.lock();
        let task = find_task_mut(&mut tasks, task_id)?;

        if !task.can_transition_to(target) {
            return Err(QueueError::InvalidTransition {
                id: task_id.to_string(),
                from: task.status,
                to: target,
            });
        }

        let snapshot = task.clone();
        task.transition_status(target);

        if let Err(err) = self.store.save(&tasks) {
            if let Ok(task) = find_task_mut(&mut tasks, task_id) {
                *task = snapshot;
            }
            return Err(err);
        }

        debug!(task_id = %task_id, status = %target, "task transitioned");
        Ok(())
    }

    /// Defensive copy of the full task list.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.lock().clone()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn tasks_for_session(&self, session_id: &str) -> Vec<Task> {
        self.lock()
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Look up a single task by id.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.lock().iter().find(|t| t.id == task_id).cloned()
    }
}

fn find_task_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Result<&'a mut Task, QueueError> {
    tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| QueueError::NotFound(task_id.to_string()))
}
