use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    tasks::repo_types::{NewTask, Task, TaskRow},
};

const TASK_COLUMNS: &str = "id, owner_id, title, description, status, created_at, updated_at";

/// Owner-scoped predicate shared by the count and page queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub owner_id: Uuid,
    /// Raw status string; values outside the enum simply match nothing.
    pub status: Option<String>,
    /// Literal, case-insensitive substring of title or description.
    pub keyword: Option<String>,
}

impl TaskFilter {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            status: None,
            keyword: None,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.owner_id != self.owner_id {
            return false;
        }
        if let Some(status) = &self.status {
            if task.status.as_str() != status {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn count(&self, filter: &TaskFilter) -> AppResult<u64>;

    /// Newest first, ties broken by id.
    async fn find_page(&self, filter: &TaskFilter, skip: u64, limit: u64) -> AppResult<Vec<Task>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Task>>;

    async fn insert(&self, new: NewTask) -> AppResult<Task>;

    /// Unconditional whole-record write; `None` if the task no longer exists.
    async fn save(&self, task: &Task) -> AppResult<Option<Task>>;

    /// `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    qb.push(" WHERE owner_id = ").push_bind(filter.owner_id);
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn count(&self, filter: &TaskFilter) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut qb, filter);
        let total: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count tasks")?;
        Ok(total.max(0) as u64)
    }

    async fn find_page(&self, filter: &TaskFilter, skip: u64, limit: u64) -> AppResult<Vec<Task>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(to_i64(limit))
            .push(" OFFSET ")
            .push_bind(to_i64(skip));
        let rows = qb
            .build_query_as::<TaskRow>()
            .fetch_all(&self.db)
            .await
            .context("list tasks")?;
        let tasks = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find task")?;
        Ok(row.map(Task::try_from).transpose()?)
    }

    async fn insert(&self, new: NewTask) -> AppResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks (owner_id, title, description, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(new.owner_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await
        .context("insert task")?;
        Ok(Task::try_from(row)?)
    }

    async fn save(&self, task: &Task) -> AppResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
               SET title = $2, description = $3, status = $4, updated_at = now()
             WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update task")?;
        Ok(row.map(Task::try_from).transpose()?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete task")?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Default)]
struct MemoryTasks {
    by_id: HashMap<Uuid, Task>,
    last_stamp: Option<OffsetDateTime>,
}

impl MemoryTasks {
    // Strictly increasing, so insertion order is also creation order.
    fn next_stamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Process-local task store used by tests.
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: RwLock<MemoryTasks>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn count(&self, filter: &TaskFilter) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.values().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn find_page(&self, filter: &TaskFilter, skip: u64, limit: u64) -> AppResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&Task> = inner.by_id.values().filter(|t| filter.matches(t)).collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(hits
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Task>> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn insert(&self, new: NewTask) -> AppResult<Task> {
        let mut inner = self.inner.write().await;
        let stamp = inner.next_stamp();
        let task = Task {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            status: new.status,
            created_at: stamp,
            updated_at: stamp,
        };
        inner.by_id.insert(task.id, task.clone());
        Ok(task)
    }

    async fn save(&self, task: &Task) -> AppResult<Option<Task>> {
        let mut inner = self.inner.write().await;
        let stamp = inner.next_stamp();
        let Some(stored) = inner.by_id.get_mut(&task.id) else {
            return Ok(None);
        };
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.status = task.status;
        stored.updated_at = stamp;
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.inner.write().await.by_id.remove(&id).is_some())
    }
}
