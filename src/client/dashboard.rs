use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    client::{
        api::{ClientError, ListRequest, NewTaskInput, TaskApi, TaskChanges},
        session::SessionStore,
        state::{reduce, Action, ClientState, FetchKey},
        Session,
    },
    tasks::dto::{PageEnvelope, DEFAULT_PAGE_SIZE},
};

/// How long a transient error stays visible.
pub const ERROR_DISPLAY_MS: u64 = 5000;

#[derive(Debug, Default)]
pub struct ErrorBanner {
    deadline: Option<Instant>,
}

impl ErrorBanner {
    /// A newer error restarts the window.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + Duration::from_millis(ERROR_DISPLAY_MS));
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Drives the task page: every state change that alters the [`FetchKey`]
/// (user, filter, keyword, page, or a finished mutation) triggers one fresh
/// `list_tasks`. Mutation results are never merged into the local list.
/// The session is written through to a [`SessionStore`] on sign-in and removed
/// on sign-out.
pub struct Dashboard {
    api: TaskApi,
    sessions: Arc<dyn SessionStore>,
    state: ClientState,
    banner: ErrorBanner,
    last_fetch: Option<FetchKey>,
}

impl Dashboard {
    /// Starts on the dashboard when `sessions` still holds a session, otherwise
    /// on the login form. An unreadable store counts as signed out.
    pub async fn open(api: TaskApi, sessions: Arc<dyn SessionStore>) -> Self {
        let restored = sessions.load().await.unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "stored session unreadable; starting signed out");
            None
        });
        Self {
            api,
            sessions,
            state: ClientState::new(restored),
            banner: ErrorBanner::default(),
            last_fetch: None,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    fn show_error(&mut self, message: String) {
        self.dispatch(Action::SetError(Some(message)));
        self.banner.arm(Instant::now());
    }

    pub fn expire_error_at(&mut self, now: Instant) {
        if self.state.error.is_some() && self.banner.is_expired(now) {
            self.dispatch(Action::SetError(None));
            self.banner.clear();
        }
    }

    pub fn expire_error(&mut self) {
        self.expire_error_at(Instant::now());
    }

    pub fn needs_fetch(&self) -> bool {
        let key = self.state.fetch_key();
        key.is_some() && key != self.last_fetch
    }

    /// Re-fetches the current page if anything it depends on has changed.
    pub async fn sync(&mut self) {
        let Some(key) = self.state.fetch_key() else {
            return;
        };
        if self.last_fetch.as_ref() == Some(&key) {
            return;
        }
        self.last_fetch = Some(key.clone());
        let Some(token) = self.state.token().map(str::to_owned) else {
            return;
        };

        debug!(page = key.page, filter = %key.filter_status, "fetching tasks");
        self.dispatch(Action::SetLoading(true));
        let req = ListRequest {
            status: key.filter_status,
            keyword: key.search_keyword,
            page: key.page,
            limit: key.page_size,
        };
        match self.api.list_tasks(&token, &req).await {
            Ok(page) => self.dispatch(Action::SetTasks(page)),
            Err(e) => {
                self.show_error(format!("Task Error: {e}"));
                self.dispatch(Action::SetTasks(PageEnvelope::empty(DEFAULT_PAGE_SIZE)));
                // The reset itself must not trigger another attempt.
                self.last_fetch = self.state.fetch_key();
            }
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> bool {
        let res = self.api.login(email, password).await;
        self.finish_auth(res).await
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> bool {
        let res = self.api.register(email, password).await;
        self.finish_auth(res).await
    }

    async fn finish_auth(&mut self, res: Result<Session, ClientError>) -> bool {
        match res {
            Ok(session) => {
                if let Err(e) = self.sessions.save(&session).await {
                    warn!(error = %format!("{e:#}"), "session not persisted");
                }
                self.banner.clear();
                self.dispatch(Action::LoginSuccess(session));
                self.sync().await;
                true
            }
            Err(e) => {
                self.show_error(e.to_string());
                false
            }
        }
    }

    pub async fn sign_out(&mut self) {
        if let Err(e) = self.sessions.clear().await {
            warn!(error = %format!("{e:#}"), "stored session not removed");
        }
        self.dispatch(Action::Logout);
        self.banner.clear();
        self.last_fetch = None;
    }

    pub async fn set_filter_status(&mut self, status: impl Into<String>) {
        self.dispatch(Action::SetFilterStatus(status.into()));
        self.sync().await;
    }

    pub async fn set_search_keyword(&mut self, keyword: impl Into<String>) {
        self.dispatch(Action::SetSearchKeyword(keyword.into()));
        self.sync().await;
    }

    pub async fn go_to_page(&mut self, page: u64) {
        self.dispatch(Action::SetPage(page));
        self.sync().await;
    }

    pub async fn create_task(&mut self, input: NewTaskInput) -> bool {
        let Some(token) = self.state.token().map(str::to_owned) else {
            return false;
        };
        match self.api.create_task(&token, &input).await {
            Ok(_) => {
                self.dispatch(Action::TaskCreated);
                self.sync().await;
                true
            }
            Err(e) => {
                self.show_error(format!("Creation Error: {e}"));
                false
            }
        }
    }

    pub async fn update_task(&mut self, id: Uuid, changes: TaskChanges) -> bool {
        let Some(token) = self.state.token().map(str::to_owned) else {
            return false;
        };
        match self.api.update_task(&token, id, &changes).await {
            Ok(_) => {
                self.dispatch(Action::TaskUpdated);
                self.sync().await;
                true
            }
            Err(e) => {
                self.show_error(format!("Update Error: {e}"));
                false
            }
        }
    }

    pub async fn delete_task(&mut self, id: Uuid) -> bool {
        let Some(token) = self.state.token().map(str::to_owned) else {
            return false;
        };
        match self.api.delete_task(&token, id).await {
            Ok(_) => {
                self.dispatch(Action::TaskDeleted);
                self.sync().await;
                true
            }
            Err(e) => {
                self.show_error(format!("Delete Error: {e}"));
                false
            }
        }
    }
}
