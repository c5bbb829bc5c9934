use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::Session;

/// Where the signed-in session survives between runs of the client.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<Session>>;

    async fn save(&self, session: &Session) -> anyhow::Result<()>;

    /// Removing an absent session is not an error.
    async fn clear(&self) -> anyhow::Result<()>;
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read session {}", self.path.display()))
            }
        };
        let session = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse session {}", self.path.display()))?;
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(session).context("encode session")?;
        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("write session {}", self.path.display()))
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("remove session {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(session: Session) -> Self {
        Self {
            slot: RwLock::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        *self.slot.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::auth::repo_types::Role;

    fn session() -> Session {
        Session {
            id: Uuid::new_v4(),
            email: "disk@x.com".into(),
            role: Role::StandardUser,
            token: "tok".into(),
        }
    }

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("taskdesk-{}", Uuid::new_v4()))
            .join("session.json")
    }

    #[tokio::test]
    async fn file_store_saves_loads_and_clears() {
        let store = FileSessionStore::new(scratch_path());
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();

        let saved = session();
        store.save(&saved).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(saved));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let store = FileSessionStore::new(scratch_path());
        store.save(&session()).await.unwrap();
        tokio::fs::write(store.path(), b"{not json").await.unwrap();
        assert!(store.load().await.is_err());
        store.clear().await.unwrap();
    }
}
