use crate::error::QueueError;
use crate::queue::TaskQueue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// File name of the per-session queue inside its session directory.
pub const QUEUE_FILE_NAME: &str = "queue.json";

/// Allocate a fresh session id for one interactive invocation.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Where a session's queue file lives: `<sessions_dir>/<session_id>/queue.json`.
pub fn queue_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(session_id).join(QUEUE_FILE_NAME)
}

/// Open a queue for every session directory under `sessions_dir`, sorted by
/// session id for stable output. A missing sessions directory is an empty
/// result, not an error.
pub fn load_all_queues(sessions_dir: &Path) -> Result<Vec<Arc<TaskQueue>>, QueueError> {
    let entries = match std::fs::read_dir(sessions_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut queues = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let session_id = entry.file_name().to_string_lossy().into_owned();
        let queue = TaskQueue::new(queue_path(sessions_dir, &session_id), &session_id)?;
        queues.push(Arc::new(queue));
    }

    queues.sort_by(|a, b| a.session_id().cmp(b.session_id()));
    Ok(queues)
}

/// Find the queue that owns a task id, across sessions.
pub fn find_queue_for_task(queues: &[Arc<TaskQueue>], task_id: &str) -> Option<Arc<TaskQueue>> {
    queues.iter().find(|q| q.task(task_id).is_some()).cloned()
}
