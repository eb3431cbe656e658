use async_trait::async_trait;
use serde_json::Value;

use crate::domain::remote::{RemoteError, TodoApi};
use crate::domain::task::{NewTask, Task, TaskId, TaskUpdate};

/// `TodoApi` over the REST backend. The base URL is injected; paths,
/// payloads and the 204-on-delete contract are fixed by the backend.
#[derive(Clone)]
pub struct HttpTodoApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTodoApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn todos_url(&self) -> String {
        format!("{}/api/todos", self.base_url)
    }

    fn todo_url(&self, id: TaskId) -> String {
        format!("{}/api/todos/{}", self.base_url, id.0)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

fn api_error(status: u16, body: &str) -> RemoteError {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .map(|message| RemoteError::Api { status, message })
        .unwrap_or_else(|| RemoteError::status(status))
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        let resp = self.client.get(self.todos_url()).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn create(&self, input: NewTask) -> Result<Task, RemoteError> {
        let resp = self.client.post(self.todos_url()).json(&input).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn update(&self, id: TaskId, input: TaskUpdate) -> Result<Task, RemoteError> {
        let resp = self.client.put(self.todo_url(id)).json(&input).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn delete(&self, id: TaskId) -> Result<(), RemoteError> {
        let resp = self.client.delete(self.todo_url(id)).send().await?;
        check(resp).await.map(|_| ())
    }
}
