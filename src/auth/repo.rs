use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User, UserRow},
    error::{AppError, AppResult},
};

pub const DUPLICATE_EMAIL: &str = "User already exists";

/// Credential store. Emails are expected normalized (trimmed, lowercase).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when the email is already taken.
    async fn create(&self, new: NewUser<'_>) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, new: NewUser<'_>) -> AppResult<User> {
        let res = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(row) => Ok(User::try_from(row)?),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict(DUPLICATE_EMAIL.into()))
            }
            Err(e) => Err(AppError::Internal(anyhow::Error::new(e).context("insert user"))),
        }
    }
}

/// Process-local credential store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewUser<'_>) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(new.email)) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.to_string(),
            password_hash: new.password_hash.to_string(),
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}
