use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::repo_types::CurrentUser,
    client::Session,
    error::ErrorBody,
    tasks::{
        dto::{MessageResponse, PageEnvelope, ALL_STATUSES},
        repo_types::{Task, TaskStatus},
    },
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the server's own text when it sent one.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub status: String,
    pub keyword: String,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTaskInput {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Fields left `None` or empty are kept as-is by the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Thin typed wrapper over the REST surface. Every call is independent; nothing
/// is retried.
#[derive(Debug, Clone)]
pub struct TaskApi {
    http: reqwest::Client,
    base_url: String,
}

impl TaskApi {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn register(&self, email: &str, password: &str) -> ClientResult<Session> {
        let res = self
            .http
            .post(self.url("/users/register"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        decode(res).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let res = self
            .http
            .post(self.url("/users/login"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        decode(res).await
    }

    pub async fn profile(&self, token: &str) -> ClientResult<CurrentUser> {
        let res = self
            .http
            .get(self.url("/users/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn list_tasks(&self, token: &str, req: &ListRequest) -> ClientResult<PageEnvelope> {
        let mut query = vec![
            ("page", req.page.to_string()),
            ("limit", req.limit.to_string()),
            ("keyword", req.keyword.clone()),
        ];
        if !req.status.is_empty() && req.status != ALL_STATUSES {
            query.push(("status", req.status.clone()));
        }
        let res = self
            .http
            .get(self.url("/tasks"))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn get_task(&self, token: &str, id: Uuid) -> ClientResult<Task> {
        let res = self
            .http
            .get(self.url(&format!("/tasks/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn create_task(&self, token: &str, input: &NewTaskInput) -> ClientResult<Task> {
        let res = self
            .http
            .post(self.url("/tasks"))
            .bearer_auth(token)
            .json(input)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn update_task(&self, token: &str, id: Uuid, changes: &TaskChanges) -> ClientResult<Task> {
        let res = self
            .http
            .put(self.url(&format!("/tasks/{id}")))
            .bearer_auth(token)
            .json(changes)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn delete_task(&self, token: &str, id: Uuid) -> ClientResult<String> {
        let res = self
            .http
            .delete(self.url(&format!("/tasks/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        let body: MessageResponse = decode(res).await?;
        Ok(body.message)
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> ClientResult<T> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }
    let message = match res.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    };
    Err(ClientError::Api { status, message })
}
