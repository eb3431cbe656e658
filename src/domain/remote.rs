use async_trait::async_trait;
use thiserror::Error;

use super::task::{NewTask, Task, TaskId, TaskUpdate};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn status(status: u16) -> Self {
        Self::Api { status, message: format!("request failed with status {status}") }
    }
}

#[async_trait]
pub trait TodoApi: Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<Task>, RemoteError>;
    async fn create(&self, input: NewTask) -> Result<Task, RemoteError>;
    async fn update(&self, id: TaskId, input: TaskUpdate) -> Result<Task, RemoteError>;
    async fn delete(&self, id: TaskId) -> Result<(), RemoteError>;
}
