use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::CurrentUser,
    error::{AppError, AppResult},
    tasks::{
        dto::{CreateTaskRequest, ListQuery, PageEnvelope, UpdateTaskRequest},
        repo::{TaskFilter, TaskStore},
        repo_types::{NewTask, Task, TaskStatus},
    },
};

pub const TASK_NOT_FOUND: &str = "Task not found";
pub const TITLE_REQUIRED: &str = "Task requires a title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    View,
    Update,
    Delete,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskAction::View => "view",
            TaskAction::Update => "update",
            TaskAction::Delete => "delete",
        })
    }
}

/// The one authorization predicate for single-task access.
pub fn owns(user: &CurrentUser, task: &Task) -> bool {
    task.owner_id == user.id
}

pub fn page_count(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size.max(1))
}

/// Resolves `raw_id` to a task the caller owns.
/// An unparseable id cannot name any task, so it is `NotFound` like a missing one.
async fn load_owned(
    store: &dyn TaskStore,
    user: &CurrentUser,
    raw_id: &str,
    action: TaskAction,
) -> AppResult<Task> {
    let id = Uuid::parse_str(raw_id).map_err(|_| AppError::NotFound(TASK_NOT_FOUND.into()))?;
    let task = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TASK_NOT_FOUND.into()))?;
    if !owns(user, &task) {
        warn!(user_id = %user.id, task_id = %task.id, %action, "task ownership check failed");
        return Err(AppError::Forbidden(format!(
            "Not authorized to {action} this task"
        )));
    }
    Ok(task)
}

/// Non-empty after trimming, or `None`.
fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Count and page are two independent reads; the total may lag concurrent writes.
pub async fn list_tasks(
    store: &dyn TaskStore,
    user: &CurrentUser,
    query: ListQuery,
) -> AppResult<PageEnvelope> {
    let filter = TaskFilter {
        owner_id: user.id,
        status: query.status,
        keyword: query.keyword,
    };
    let page_size = query.page_size.max(1);
    let page = query.page.max(1);
    let skip = (page - 1).saturating_mul(page_size);

    let total_count = store.count(&filter).await?;
    let items = store.find_page(&filter, skip, page_size).await?;

    Ok(PageEnvelope {
        items,
        page,
        page_count: page_count(total_count, page_size),
        total_count,
        page_size,
    })
}

pub async fn get_task(store: &dyn TaskStore, user: &CurrentUser, task_id: &str) -> AppResult<Task> {
    load_owned(store, user, task_id, TaskAction::View).await
}

pub async fn create_task(
    store: &dyn TaskStore,
    user: &CurrentUser,
    req: CreateTaskRequest,
) -> AppResult<Task> {
    let title = non_blank(req.title).ok_or_else(|| AppError::InvalidInput(TITLE_REQUIRED.into()))?;
    let status = match req.status.as_deref() {
        None | Some("") => TaskStatus::default(),
        Some(s) => s.parse()?,
    };
    let task = store
        .insert(NewTask {
            owner_id: user.id,
            title,
            description: req.description,
            status,
        })
        .await?;
    info!(user_id = %user.id, task_id = %task.id, "task created");
    Ok(task)
}

/// Truthy-merge: only non-empty supplied values replace stored ones, so a field
/// cannot be cleared through this call. Last write wins under concurrency.
pub async fn update_task(
    store: &dyn TaskStore,
    user: &CurrentUser,
    task_id: &str,
    req: UpdateTaskRequest,
) -> AppResult<Task> {
    let mut task = load_owned(store, user, task_id, TaskAction::Update).await?;

    if let Some(title) = req.title.filter(|t| !t.is_empty()) {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput(TITLE_REQUIRED.into()));
        }
        task.title = title.to_string();
    }
    if let Some(description) = req.description.filter(|d| !d.is_empty()) {
        task.description = Some(description);
    }
    if let Some(status) = req.status.filter(|s| !s.is_empty()) {
        task.status = status.parse()?;
    }

    store
        .save(&task)
        .await?
        .ok_or_else(|| AppError::NotFound(TASK_NOT_FOUND.into()))
}

pub async fn delete_task(store: &dyn TaskStore, user: &CurrentUser, task_id: &str) -> AppResult<()> {
    let task = load_owned(store, user, task_id, TaskAction::Delete).await?;
    if !store.delete(task.id).await? {
        return Err(AppError::NotFound(TASK_NOT_FOUND.into()));
    }
    info!(user_id = %user.id, task_id = %task.id, "task deleted");
    Ok(())
}
