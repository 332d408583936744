//! Arena controller
//!
//! Tracks comparison runs as tasks keyed by id. Each run executes on its own
//! tokio task; state transitions:
//!
//! ```text
//! pending -> running -> completed | failed | cancelled | paused
//! paused  -> running (resume starts a fresh run with the original inputs)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::compare::Arena;
use super::types::{CompareOptions, ModelComparisonResult, ModelSpec};
use crate::error::LlmError;
use crate::types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a run is (or is about to be) in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// One tracked comparison run.
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    pub id: String,
    pub status: TaskStatus,
    pub models: Vec<ModelSpec>,
    pub messages: Vec<ChatMessage>,
    pub options: CompareOptions,
    pub results: Option<Vec<ModelComparisonResult>>,
    pub error: Option<LlmError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    token: CancellationToken,
    // Bumped per run so a superseded run cannot overwrite newer state.
    generation: u64,
}

impl ComparisonTask {
    fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

struct TaskEntry {
    task: ComparisonTask,
    status_tx: watch::Sender<TaskStatus>,
}

impl TaskEntry {
    fn transition(&mut self, status: TaskStatus) {
        self.task.set_status(status);
        self.status_tx.send_replace(status);
    }
}

type TaskMap = Arc<Mutex<HashMap<String, TaskEntry>>>;

/// Task-id keyed state machine over `Arena::compare_models` runs.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct ArenaController {
    arena: Arc<Arena>,
    tasks: TaskMap,
}

impl ArenaController {
    pub fn new(arena: Arc<Arena>) -> Self {
        Self {
            arena,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, TaskEntry>>, LlmError> {
        self.tasks
            .lock()
            .map_err(|e| LlmError::InternalError(format!("Task map lock poisoned: {e}")))
    }

    /// Start tracking and running a comparison under `id`.
    ///
    /// Fails when a task with the same id is still tracked.
    pub fn start(
        &self,
        id: impl Into<String>,
        models: Vec<ModelSpec>,
        messages: Vec<ChatMessage>,
        options: CompareOptions,
    ) -> Result<(), LlmError> {
        let id = id.into();
        let mut tasks = self.lock()?;
        if tasks.contains_key(&id) {
            return Err(LlmError::InvalidParameter(format!(
                "task '{id}' is already tracked"
            )));
        }
        let now = Utc::now();
        let task = ComparisonTask {
            id: id.clone(),
            status: TaskStatus::Pending,
            models,
            messages,
            options,
            results: None,
            error: None,
            created_at: now,
            updated_at: now,
            token: CancellationToken::new(),
            generation: 0,
        };
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        let mut entry = TaskEntry { task, status_tx };
        self.launch(&mut entry);
        tasks.insert(id, entry);
        Ok(())
    }

    /// Abort the in-flight run and mark the task paused.
    pub fn pause(&self, id: &str) -> Result<(), LlmError> {
        let mut tasks = self.lock()?;
        let entry = tasks.get_mut(id).ok_or_else(|| unknown_task(id))?;
        if !entry.task.status.is_active() {
            return Err(LlmError::InvalidParameter(format!(
                "task '{id}' is {:?} and cannot be paused",
                entry.task.status
            )));
        }
        entry.task.token.cancel();
        entry.transition(TaskStatus::Paused);
        info!(task = id, "Comparison paused");
        Ok(())
    }

    /// Start a fresh run of a paused task with its original inputs.
    pub fn resume(&self, id: &str) -> Result<(), LlmError> {
        let mut tasks = self.lock()?;
        let entry = tasks.get_mut(id).ok_or_else(|| unknown_task(id))?;
        if entry.task.status != TaskStatus::Paused {
            return Err(LlmError::InvalidParameter(format!(
                "task '{id}' is {:?} and cannot be resumed",
                entry.task.status
            )));
        }
        entry.task.token = CancellationToken::new();
        entry.task.results = None;
        entry.task.error = None;
        self.launch(entry);
        info!(task = id, "Comparison resumed");
        Ok(())
    }

    /// Abort and mark cancelled. No-op once the task is terminal.
    pub fn cancel(&self, id: &str) -> Result<(), LlmError> {
        let mut tasks = self.lock()?;
        let entry = tasks.get_mut(id).ok_or_else(|| unknown_task(id))?;
        if entry.task.status.is_terminal() {
            return Ok(());
        }
        entry.task.token.cancel();
        entry.transition(TaskStatus::Cancelled);
        info!(task = id, "Comparison cancelled");
        Ok(())
    }

    /// Abort any in-flight run and forget the task. Returns whether it existed.
    pub fn clear_task(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.remove(id) {
            Some(entry) => {
                entry.task.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn clear_all_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in tasks.drain() {
            entry.task.token.cancel();
        }
    }

    pub fn get_task(&self, id: &str) -> Option<ComparisonTask> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.get(id).map(|e| e.task.clone())
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.get(id).map(|e| e.task.status)
    }

    /// Every tracked task, oldest first.
    pub fn list_tasks(&self) -> Vec<ComparisonTask> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<ComparisonTask> = tasks.values().map(|e| e.task.clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Wait until the task leaves `pending`/`running`. Returns the status it
    /// settled in, or `None` for an unknown (or cleared) task.
    pub async fn wait(&self, id: &str) -> Option<TaskStatus> {
        let mut rx = {
            let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.get(id)?.status_tx.subscribe()
        };
        let settled = rx.wait_for(|s| !s.is_active()).await.ok().map(|s| *s);
        settled
    }

    /// Spawn a run for `entry` and mark it running.
    fn launch(&self, entry: &mut TaskEntry) {
        entry.task.generation += 1;
        let generation = entry.task.generation;
        let id = entry.task.id.clone();
        let models = entry.task.models.clone();
        let messages = entry.task.messages.clone();
        let options = entry
            .task
            .options
            .clone()
            .with_cancellation(entry.task.token.clone());
        let arena = self.arena.clone();
        let tasks = self.tasks.clone();

        entry.transition(TaskStatus::Running);
        debug!(task = %id, generation, "Launching comparison run");

        tokio::spawn(async move {
            let outcome = arena.compare_models(&models, messages, options).await;
            let mut tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = tasks.get_mut(&id) else {
                return;
            };
            if entry.task.generation != generation || entry.task.status != TaskStatus::Running {
                debug!(task = %id, generation, "Discarding superseded run outcome");
                return;
            }
            match outcome {
                Ok(results) => {
                    entry.task.results = Some(results);
                    entry.transition(TaskStatus::Completed);
                }
                Err(e) => {
                    entry.task.error = Some(e);
                    entry.transition(TaskStatus::Failed);
                }
            }
        });
    }
}

fn unknown_task(id: &str) -> LlmError {
    LlmError::InvalidParameter(format!("unknown task '{id}'"))
}
