// State management module
//
// This module provides the StateManager which wraps GlobalState behind a single
// mutex, notifies per-key observers synchronously on mutation, and broadcasts
// coarse change events for cross-thread consumers such as the GUI.

use crate::error::StateError;
use crate::models::{
    CollectionState, CollectionStatus, GlobalState, TaskState, TaskStatus, UiState,
};
use chrono::Local;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

/// Observer key for collection state changes
pub const COLLECTION_KEY: &str = "collection";
/// Observer key for UI state changes
pub const UI_KEY: &str = "ui";
/// Observer key for tasks being added to or removed from the map
pub const TASKS_KEY: &str = "tasks";

/// Observer key for changes to an existing task.
pub fn task_key(task_id: &str) -> String {
    format!("task.{}", task_id)
}

/// A value carried by a [`StateEvent`].
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    Collection(CollectionState),
    Ui(UiState),
    Task(TaskState),
}

impl StateValue {
    pub fn as_task(&self) -> Option<&TaskState> {
        match self {
            StateValue::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionState> {
        match self {
            StateValue::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_ui(&self) -> Option<&UiState> {
        match self {
            StateValue::Ui(ui) => Some(ui),
            _ => None,
        }
    }
}

/// Notification delivered to observers registered on `key`.
///
/// `old` is `None` when a task is added; `new` is `None` when a task is removed.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    pub key: String,
    pub old: Option<StateValue>,
    pub new: Option<StateValue>,
}

/// Observer callback. Errors are logged and never reach the mutator.
pub type StateObserver = dyn Fn(&StateEvent) -> anyhow::Result<()> + Send + Sync;

/// Handle returned by [`StateManager::register_observer`], used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Change events broadcast to subscribers
///
/// These are emitted alongside observer notifications so that consumers on
/// other threads (primarily the GUI) can react without registering callbacks
/// that run on the mutating thread.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Collection counters or status changed
    CollectionUpdated {
        status: CollectionStatus,
        completed: usize,
        total: usize,
        progress: f64,
    },

    /// UI state changed
    UiUpdated { current_page: String, theme: String },

    /// A new task was added
    TaskAdded { task_id: String },

    /// An existing task was replaced or updated
    TaskUpdated {
        task_id: String,
        status: TaskStatus,
        progress: f64,
    },

    /// A task was removed
    TaskRemoved { task_id: String },

    /// All tasks were cleared
    TasksCleared { count: usize },

    /// State has been reset
    StateReset,

    /// State has been replaced by an import
    StateImported,
}

impl StateChange {
    fn from_event(event: &StateEvent) -> Option<Self> {
        match (event.old.as_ref(), event.new.as_ref()) {
            (_, Some(StateValue::Collection(c))) => Some(StateChange::CollectionUpdated {
                status: c.status,
                completed: c.completed_tasks,
                total: c.total_tasks,
                progress: c.progress(),
            }),
            (_, Some(StateValue::Ui(ui))) => Some(StateChange::UiUpdated {
                current_page: ui.current_page.clone(),
                theme: ui.theme.clone(),
            }),
            (None, Some(StateValue::Task(task))) => Some(StateChange::TaskAdded {
                task_id: task.task_id.clone(),
            }),
            (Some(_), Some(StateValue::Task(task))) => Some(StateChange::TaskUpdated {
                task_id: task.task_id.clone(),
                status: task.status,
                progress: task.progress,
            }),
            (Some(StateValue::Task(task)), None) => Some(StateChange::TaskRemoved {
                task_id: task.task_id.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Default)]
struct ObserverRegistry {
    by_key: HashMap<String, Vec<(ObserverId, Arc<StateObserver>)>>,
}

/// Thread-safe global state manager with observer notification
///
/// - A single mutex guards every read and write of [`GlobalState`]
/// - Observers are registered per key (`"collection"`, `"ui"`, `"tasks"`,
///   `"task.<id>"`) and receive the old and new values of that key
/// - Mutations and their observer notifications are serialized by a
///   reentrant mutation lock, so observers see events in mutation order
/// - Observers run synchronously on the mutating thread before the mutating
///   call returns; the state mutex itself is released first, so an observer
///   may read or mutate the manager on the same thread
/// - Each observer failure (error or panic) is logged; the remaining
///   observers still run and the mutator is unaffected
///
/// # Related Types
///
/// - [`crate::models::GlobalState`]: The underlying state structure
/// - [`StateChange`]: Events broadcast to [`subscribe()`](Self::subscribe) receivers
pub struct StateManager {
    state: Arc<Mutex<GlobalState>>,
    observers: Arc<Mutex<ObserverRegistry>>,
    mutation: Arc<ReentrantMutex<()>>,
    next_observer_id: Arc<AtomicU64>,
    state_tx: broadcast::Sender<StateChange>,
}

/// Non-owning handle for reading state from long-lived consumers.
///
/// Unlike a [`StateManager`] clone it does not keep the broadcast channel
/// open, so subscribers holding one still see `Closed` once every manager
/// is dropped.
#[derive(Clone)]
pub struct WeakStateManager {
    state: Weak<Mutex<GlobalState>>,
}

impl WeakStateManager {
    /// Deep copy of the state, or `None` once the manager is gone.
    pub fn get_state(&self) -> Option<GlobalState> {
        let state = self.state.upgrade()?;
        let snapshot = state.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Some(snapshot)
    }
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// The broadcast channel buffers 100 events per subscriber.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        tracing::info!("State manager initialized");
        Self {
            state: Arc::new(Mutex::new(GlobalState::default())),
            observers: Arc::new(Mutex::new(ObserverRegistry::default())),
            mutation: Arc::new(ReentrantMutex::new(())),
            next_observer_id: Arc::new(AtomicU64::new(1)),
            state_tx,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GlobalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held from the start of a mutation until its observers have run.
    fn lock_mutations(&self) -> ReentrantMutexGuard<'_, ()> {
        self.mutation.lock()
    }

    pub fn downgrade(&self) -> WeakStateManager {
        WeakStateManager {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Get a deep copy of the current global state.
    pub fn get_state(&self) -> GlobalState {
        self.lock_state().clone()
    }

    /// Execute a function with access to the state under the lock
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.active_tasks().len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&GlobalState) -> R,
    {
        let state = self.lock_state();
        f(&state)
    }

    pub fn get_collection_state(&self) -> CollectionState {
        self.read(|s| s.collection.clone())
    }

    /// Update collection state fields
    ///
    /// # Errors
    /// [`StateError::Invariant`] if the result has more completed tasks than
    /// total tasks; the state is left unchanged.
    ///
    /// # Example
    /// ```ignore
    /// state_manager.update_collection_state(|c| {
    ///     c.total_tasks = 10;
    ///     c.status = CollectionStatus::Collecting;
    /// })?;
    /// ```
    pub fn update_collection_state<F>(&self, update_fn: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut CollectionState),
    {
        let _serial = self.lock_mutations();
        let event = {
            let mut state = self.lock_state();
            let old = state.collection.clone();
            let mut new = old.clone();
            update_fn(&mut new);
            new.check_invariants().map_err(|reason| StateError::Invariant {
                scope: COLLECTION_KEY.to_string(),
                reason,
            })?;

            state.collection = new.clone();
            state.last_updated = Local::now();
            StateEvent {
                key: COLLECTION_KEY.to_string(),
                old: Some(StateValue::Collection(old)),
                new: Some(StateValue::Collection(new)),
            }
        };

        tracing::debug!("Collection state updated");
        self.notify(vec![event]);
        Ok(())
    }

    pub fn get_ui_state(&self) -> UiState {
        self.read(|s| s.ui.clone())
    }

    /// Update UI state fields; `last_updated` is stamped automatically.
    pub fn update_ui_state<F>(&self, update_fn: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut UiState),
    {
        let _serial = self.lock_mutations();
        let event = {
            let mut state = self.lock_state();
            let old = state.ui.clone();
            let mut new = old.clone();
            update_fn(&mut new);
            new.check_invariants().map_err(|reason| StateError::Invariant {
                scope: UI_KEY.to_string(),
                reason,
            })?;

            new.last_updated = Local::now();
            state.ui = new.clone();
            state.last_updated = new.last_updated;
            StateEvent {
                key: UI_KEY.to_string(),
                old: Some(StateValue::Ui(old)),
                new: Some(StateValue::Ui(new)),
            }
        };

        tracing::debug!("UI state updated");
        self.notify(vec![event]);
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> Option<TaskState> {
        self.read(|s| s.get_task(task_id).cloned())
    }

    pub fn get_all_tasks(&self) -> Vec<TaskState> {
        self.read(|s| s.tasks.values().cloned().collect())
    }

    /// Add or replace a task
    ///
    /// A new id notifies `"tasks"` with `(None, task)`; replacing an existing
    /// id notifies `"task.<id>"` with `(old, new)`.
    pub fn add_task(&self, task: TaskState) -> Result<(), StateError> {
        task.check_invariants()
            .map_err(|reason| StateError::Invariant {
                scope: "task".to_string(),
                reason,
            })?;

        let task_id = task.task_id.clone();
        let _serial = self.lock_mutations();
        let event = {
            let mut state = self.lock_state();
            let previous = state.add_task(task.clone());
            match previous {
                Some(old) => StateEvent {
                    key: task_key(&task_id),
                    old: Some(StateValue::Task(old)),
                    new: Some(StateValue::Task(task)),
                },
                None => StateEvent {
                    key: TASKS_KEY.to_string(),
                    old: None,
                    new: Some(StateValue::Task(task)),
                },
            }
        };

        tracing::debug!("Task added/updated: {}", task_id);
        self.notify(vec![event]);
        Ok(())
    }

    /// Update task fields
    ///
    /// # Errors
    /// - [`StateError::TaskNotFound`] if no task has this id
    /// - [`StateError::Invariant`] if the update changes the id or pushes
    ///   progress outside `0..=100`; the task is left unchanged
    pub fn update_task<F>(&self, task_id: &str, update_fn: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut TaskState),
    {
        let _serial = self.lock_mutations();
        let event = {
            let mut state = self.lock_state();
            let old = state
                .get_task(task_id)
                .cloned()
                .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;

            let mut new = old.clone();
            update_fn(&mut new);
            if new.task_id != old.task_id {
                return Err(StateError::Invariant {
                    scope: "task".to_string(),
                    reason: format!("task id cannot change ({} -> {})", old.task_id, new.task_id),
                });
            }
            new.check_invariants().map_err(|reason| StateError::Invariant {
                scope: "task".to_string(),
                reason,
            })?;

            state.add_task(new.clone());
            StateEvent {
                key: task_key(task_id),
                old: Some(StateValue::Task(old)),
                new: Some(StateValue::Task(new)),
            }
        };

        tracing::debug!("Task updated: {}", task_id);
        self.notify(vec![event]);
        Ok(())
    }

    /// Move a task to `status`, stamping `started_at` the first time it runs
    /// and `completed_at` when it reaches a terminal status.
    pub fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StateError> {
        self.update_task(task_id, |task| {
            let now = Local::now();
            if status == TaskStatus::Running && task.started_at.is_none() {
                task.started_at = Some(now);
            }
            if status.is_terminal() {
                task.completed_at = Some(now);
                if status == TaskStatus::Completed {
                    task.progress = 100.0;
                }
            }
            task.status = status;
        })
    }

    /// Remove a task
    ///
    /// # Returns
    /// `true` if the task existed; `false` otherwise. Never errors.
    pub fn remove_task(&self, task_id: &str) -> bool {
        let _serial = self.lock_mutations();
        let removed = self.lock_state().remove_task(task_id);

        match removed {
            Some(task) => {
                tracing::debug!("Task removed: {}", task_id);
                self.notify(vec![StateEvent {
                    key: TASKS_KEY.to_string(),
                    old: Some(StateValue::Task(task)),
                    new: None,
                }]);
                true
            }
            None => false,
        }
    }

    /// Clear all tasks, notifying `"tasks"` once per removed task.
    pub fn clear_tasks(&self) {
        let _serial = self.lock_mutations();
        let removed: Vec<TaskState> = {
            let mut state = self.lock_state();
            let removed = state.tasks.drain(..).map(|(_, task)| task).collect();
            state.last_updated = Local::now();
            removed
        };

        let count = removed.len();
        let events = removed
            .into_iter()
            .map(|task| StateEvent {
                key: TASKS_KEY.to_string(),
                old: Some(StateValue::Task(task)),
                new: None,
            })
            .collect();
        self.notify(events);
        let _ = self.state_tx.send(StateChange::TasksCleared { count });

        tracing::info!("All tasks cleared ({} removed)", count);
    }

    /// Register a state change observer
    ///
    /// # Arguments
    /// * `key` - State key to observe (`"collection"`, `"ui"`, `"tasks"`, `"task.<id>"`)
    /// * `callback` - Invoked with each [`StateEvent`] for that key
    pub fn register_observer<F>(&self, key: impl Into<String>, callback: F) -> ObserverId
    where
        F: Fn(&StateEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let key = key.into();
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.lock_observers()
            .by_key
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));

        tracing::debug!("Observer registered for: {}", key);
        id
    }

    /// Unregister a state change observer
    ///
    /// # Returns
    /// `true` if the observer was registered on `key`
    pub fn unregister_observer(&self, key: &str, id: ObserverId) -> bool {
        let mut observers = self.lock_observers();
        let Some(callbacks) = observers.by_key.get_mut(key) else {
            return false;
        };

        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        let removed = callbacks.len() < before;

        if callbacks.is_empty() {
            observers.by_key.remove(key);
        }
        if removed {
            tracing::debug!("Observer unregistered for: {}", key);
        }
        removed
    }

    /// Clear observers for `key`, or every observer when `key` is `None`.
    pub fn clear_observers(&self, key: Option<&str>) {
        let mut observers = self.lock_observers();
        match key {
            Some(key) => {
                if observers.by_key.remove(key).is_some() {
                    tracing::debug!("Observers cleared for: {}", key);
                }
            }
            None => {
                observers.by_key.clear();
                tracing::info!("All observers cleared");
            }
        }
    }

    /// Number of observers currently registered on `key`.
    pub fn observer_count(&self, key: &str) -> usize {
        self.lock_observers()
            .by_key
            .get(key)
            .map_or(0, |callbacks| callbacks.len())
    }

    /// Subscribe to broadcast state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Reset state to initial values and drop every observer.
    pub fn reset(&self) {
        let _serial = self.lock_mutations();
        *self.lock_state() = GlobalState::default();
        self.lock_observers().by_key.clear();
        let _ = self.state_tx.send(StateChange::StateReset);

        tracing::info!("State manager reset");
    }

    /// Export state as a JSON value.
    pub fn export_state(&self) -> Result<serde_json::Value, StateError> {
        let state = self.get_state();
        serde_json::to_value(&state).map_err(StateError::Export)
    }

    /// Replace the state with an exported JSON value
    ///
    /// Observers are not notified; subscribers receive [`StateChange::StateImported`].
    ///
    /// # Errors
    /// [`StateError::Import`] for malformed input, [`StateError::Invariant`]
    /// when the imported state violates an invariant. The current state is
    /// kept on error.
    pub fn import_state(&self, state_data: serde_json::Value) -> Result<(), StateError> {
        let new_state: GlobalState = serde_json::from_value(state_data).map_err(StateError::Import)?;
        Self::check_imported(&new_state)?;

        let _serial = self.lock_mutations();
        *self.lock_state() = new_state;
        let _ = self.state_tx.send(StateChange::StateImported);

        tracing::info!("State imported successfully");
        Ok(())
    }

    fn check_imported(state: &GlobalState) -> Result<(), StateError> {
        let invariant = |scope: &str| {
            let scope = scope.to_string();
            move |reason| StateError::Invariant { scope, reason }
        };

        state.collection.check_invariants().map_err(invariant(COLLECTION_KEY))?;
        state.ui.check_invariants().map_err(invariant(UI_KEY))?;
        for (id, task) in &state.tasks {
            if *id != task.task_id {
                return Err(StateError::Invariant {
                    scope: "task".to_string(),
                    reason: format!("map key {} does not match task id {}", id, task.task_id),
                });
            }
            task.check_invariants().map_err(invariant("task"))?;
        }
        Ok(())
    }

    /// Deliver events to the observers registered on each event's key, then broadcast.
    fn notify(&self, events: Vec<StateEvent>) {
        for event in events {
            let callbacks: Vec<Arc<StateObserver>> = self
                .lock_observers()
                .by_key
                .get(&event.key)
                .map(|callbacks| callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default();

            for callback in callbacks {
                match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!("Observer callback error for {}: {:#}", event.key, e);
                    }
                    Err(_) => {
                        tracing::error!("Observer callback panicked for {}", event.key);
                    }
                }
            }

            if let Some(change) = StateChange::from_event(&event) {
                // Ignore send errors - it's OK if no one is listening
                let _ = self.state_tx.send(change);
            }
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same state, observers and broadcast channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            observers: Arc::clone(&self.observers),
            mutation: Arc::clone(&self.mutation),
            next_observer_id: Arc::clone(&self.next_observer_id),
            state_tx: self.state_tx.clone(),
        }
    }
}
