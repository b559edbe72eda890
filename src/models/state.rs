use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UI_MIN_WINDOW_WIDTH: u32 = 800;
pub const UI_MIN_WINDOW_HEIGHT: u32 = 600;

/// Free-form task metadata, ordered by insertion.
pub type TaskMetadata = IndexMap<String, serde_json::Value>;

/// Lifecycle of a single collection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled tasks do not run again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    #[default]
    Idle,
    Collecting,
    Paused,
    Stopped,
}

/// State of one unit of collection work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Percentage in `0.0..=100.0`
    #[serde(default)]
    pub progress: f64,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub started_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at: Local::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata: TaskMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check the progress bound; returns the violation message if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.progress) {
            return Err(format!(
                "task {} progress must be between 0 and 100 (got {})",
                self.task_id, self.progress
            ));
        }
        Ok(())
    }
}

/// Aggregate state of the overall collection batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionState {
    pub status: CollectionStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_products: usize,
    pub started_at: Option<DateTime<Local>>,
    pub current_task_id: Option<String>,
}

impl CollectionState {
    /// Overall progress percentage, `0.0` when there are no tasks.
    pub fn progress(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        (self.completed_tasks as f64 / self.total_tasks as f64) * 100.0
    }

    /// Completed tasks can never exceed the total, which keeps progress within 0..=100.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.completed_tasks > self.total_tasks {
            return Err(format!(
                "completed_tasks ({}) exceeds total_tasks ({})",
                self.completed_tasks, self.total_tasks
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    pub current_page: String,
    pub sidebar_visible: bool,
    pub theme: String,
    pub window_width: u32,
    pub window_height: u32,
    pub last_updated: DateTime<Local>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            current_page: "home".to_string(),
            sidebar_visible: true,
            theme: "light".to_string(),
            window_width: 1280,
            window_height: 800,
            last_updated: Local::now(),
        }
    }
}

impl UiState {
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.window_width < UI_MIN_WINDOW_WIDTH {
            return Err(format!(
                "window_width must be at least {} (got {})",
                UI_MIN_WINDOW_WIDTH, self.window_width
            ));
        }
        if self.window_height < UI_MIN_WINDOW_HEIGHT {
            return Err(format!(
                "window_height must be at least {} (got {})",
                UI_MIN_WINDOW_HEIGHT, self.window_height
            ));
        }
        Ok(())
    }
}

/// Root of the observable application state.
///
/// Wrapped by [`crate::state::StateManager`]; do not share a `GlobalState`
/// across threads directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalState {
    pub collection: CollectionState,
    pub ui: UiState,
    pub tasks: IndexMap<String, TaskState>,
    pub session_id: Option<String>,
    pub last_updated: DateTime<Local>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            collection: CollectionState::default(),
            ui: UiState::default(),
            tasks: IndexMap::new(),
            session_id: None,
            last_updated: Local::now(),
        }
    }
}

impl GlobalState {
    pub fn get_task(&self, task_id: &str) -> Option<&TaskState> {
        self.tasks.get(task_id)
    }

    /// Insert or replace a task, returning the previous entry.
    pub fn add_task(&mut self, task: TaskState) -> Option<TaskState> {
        let previous = self.tasks.insert(task.task_id.clone(), task);
        self.last_updated = Local::now();
        previous
    }

    /// Remove a task; `None` when the id is unknown.
    pub fn remove_task(&mut self, task_id: &str) -> Option<TaskState> {
        let removed = self.tasks.shift_remove(task_id);
        if removed.is_some() {
            self.last_updated = Local::now();
        }
        removed
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&TaskState> {
        self.tasks.values().filter(|t| t.status == status).collect()
    }

    pub fn active_tasks(&self) -> Vec<&TaskState> {
        self.tasks_with_status(TaskStatus::Running)
    }

    pub fn completed_tasks(&self) -> Vec<&TaskState> {
        self.tasks_with_status(TaskStatus::Completed)
    }

    pub fn failed_tasks(&self) -> Vec<&TaskState> {
        self.tasks_with_status(TaskStatus::Failed)
    }
}
