use std::sync::Mutex;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::remote::TodoApi;
use crate::domain::task::{Filter, NewTask, Task, TaskCounts, TaskId, TaskUpdate};

/// In-progress rename of a single task. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub id: TaskId,
    pub title: String,
}

#[derive(Default)]
struct StoreState {
    tasks: Vec<Task>,
    filter: Filter,
    error: Option<String>,
    loading: bool,
    saving: bool,
    editing: Option<Edit>,
    load_seq: u64,
}

type Listener = Box<dyn Fn() + Send>;

/// Client-side synchronization layer over the remote todo API.
///
/// Holds the local snapshot of the task list and keeps it consistent with
/// the backend: delete and clear-completed apply optimistically and fall
/// back to a compensating reload on failure; create, toggle and rename go
/// to the server first and refresh afterwards. Remote failures never
/// propagate to the consumer; they land in a single error slot instead.
pub struct TodoStore<A: TodoApi> {
    api: A,
    state: Mutex<StoreState>,
    listeners: Mutex<Vec<Listener>>,
}

impl<A: TodoApi> TodoStore<A> {
    pub fn new(api: A) -> Self {
        Self { api, state: Mutex::new(StoreState::default()), listeners: Mutex::new(Vec::new()) }
    }

    /// Registers an observer invoked after every state change. Listeners are
    /// called without the state lock held, so they may read the store freely.
    pub fn subscribe(&self, listener: impl Fn() + Send + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    fn notify(&self) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener();
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let out = f(&mut self.state.lock().unwrap());
        self.notify();
        out
    }

    /// Replaces the local list with the server's, wholesale. Each call takes
    /// a fresh sequence token; a response that resolves after a newer load
    /// was issued is discarded so overlapping refreshes cannot leave stale
    /// data visible.
    pub async fn load(&self) {
        let token = self.mutate(|s| {
            s.load_seq += 1;
            s.loading = true;
            s.load_seq
        });
        let result = self.api.list().await;
        self.mutate(|s| {
            if token != s.load_seq {
                debug!(token, latest = s.load_seq, "discarding stale load response");
                return;
            }
            s.loading = false;
            match result {
                Ok(tasks) => {
                    debug!(count = tasks.len(), "loaded tasks");
                    s.tasks = tasks;
                    s.error = None;
                }
                Err(e) => {
                    warn!(error = %e, "load failed");
                    s.error = Some(e.to_string());
                }
            }
        });
    }

    /// Creates a task with the trimmed title. A blank title is a silent
    /// no-op. Not optimistic: the task appears locally only through the
    /// reload after the server confirms it.
    pub async fn create(&self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        self.mutate(|s| s.saving = true);
        let result = self.api.create(NewTask { title: title.to_string() }).await;
        self.mutate(|s| s.saving = false);
        match result {
            Ok(task) => {
                debug!(id = task.id.0, "created task");
                self.load().await;
            }
            Err(e) => {
                warn!(error = %e, "create failed");
                self.mutate(|s| s.error = Some(e.to_string()));
            }
        }
    }

    /// Flips a task's completed flag via a full-record update carrying the
    /// existing title. Not optimistic; the visible state changes only after
    /// the round trip succeeds and the list is refreshed.
    pub async fn toggle_completion(&self, id: TaskId) {
        let Some(update) = self.read(|s| {
            s.tasks
                .iter()
                .find(|t| t.id == id)
                .map(|t| TaskUpdate { title: t.title.clone(), completed: !t.completed })
        }) else {
            return;
        };
        match self.api.update(id, update).await {
            Ok(_) => self.load().await,
            Err(e) => {
                warn!(error = %e, id = id.0, "toggle failed");
                self.mutate(|s| s.error = Some(e.to_string()));
            }
        }
    }

    /// Enters edit mode for the given task, seeding the buffer with its
    /// current title. Any edit already in progress is discarded.
    pub fn begin_edit(&self, id: TaskId) {
        let Some(title) = self.read(|s| s.tasks.iter().find(|t| t.id == id).map(|t| t.title.clone()))
        else {
            return;
        };
        self.mutate(|s| s.editing = Some(Edit { id, title }));
    }

    pub fn set_edit_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.mutate(|s| {
            if let Some(edit) = s.editing.as_mut() {
                edit.title = title;
            }
        });
    }

    pub fn cancel_edit(&self) {
        self.mutate(|s| s.editing = None);
    }

    /// Commits the in-progress rename, keeping the task's completed flag as
    /// is. A blank buffer is a no-op that stays in edit mode. On failure the
    /// buffer survives so the typed text is not lost; only success exits
    /// edit mode.
    pub async fn save_edit(&self) {
        let Some((id, update)) = self.read(|s| {
            let edit = s.editing.as_ref()?;
            let title = edit.title.trim();
            if title.is_empty() {
                return None;
            }
            let task = s.tasks.iter().find(|t| t.id == edit.id)?;
            Some((edit.id, TaskUpdate { title: title.to_string(), completed: task.completed }))
        }) else {
            return;
        };
        match self.api.update(id, update).await {
            Ok(_) => {
                self.mutate(|s| s.editing = None);
                self.load().await;
            }
            Err(e) => {
                warn!(error = %e, id = id.0, "rename failed");
                self.mutate(|s| s.error = Some(e.to_string()));
            }
        }
    }

    /// Removes the task locally before the remote call resolves. The caller
    /// must already hold user confirmation. On failure the error is recorded
    /// and a compensating reload restores server truth.
    pub async fn delete(&self, id: TaskId) {
        let removed = self.mutate(|s| {
            let before = s.tasks.len();
            s.tasks.retain(|t| t.id != id);
            s.tasks.len() != before
        });
        if !removed {
            return;
        }
        if let Err(e) = self.api.delete(id).await {
            warn!(error = %e, id = id.0, "delete failed");
            self.mutate(|s| s.error = Some(e.to_string()));
            self.load().await;
        }
    }

    /// Deletes every completed task, optimistically and concurrently. The
    /// caller must already hold user confirmation. One or more failures
    /// collapse into a single error and a reload reconciles whatever subset
    /// went through.
    pub async fn clear_completed(&self) {
        let ids: Vec<TaskId> =
            self.read(|s| s.tasks.iter().filter(|t| t.completed).map(|t| t.id).collect());
        if ids.is_empty() {
            return;
        }
        self.mutate(|s| s.tasks.retain(|t| !t.completed));
        let results = join_all(ids.iter().map(|id| self.api.delete(*id))).await;
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            warn!(failures, total = ids.len(), "clear-completed batch failed");
            self.mutate(|s| {
                s.error = Some(format!("failed to delete {failures} of {} completed tasks", ids.len()));
            });
            self.load().await;
        }
    }

    pub fn set_filter(&self, filter: Filter) {
        self.mutate(|s| s.filter = filter);
    }

    pub fn dismiss_error(&self) {
        self.mutate(|s| s.error = None);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(|s| s.tasks.clone())
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.read(|s| s.tasks.iter().filter(|t| s.filter.matches(t)).cloned().collect())
    }

    pub fn counts(&self) -> TaskCounts {
        self.read(|s| TaskCounts::of(&s.tasks))
    }

    pub fn filter(&self) -> Filter {
        self.read(|s| s.filter)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    pub fn is_saving(&self) -> bool {
        self.read(|s| s.saving)
    }

    pub fn editing(&self) -> Option<Edit> {
        self.read(|s| s.editing.clone())
    }
}
