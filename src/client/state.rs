use uuid::Uuid;

use crate::{
    client::Session,
    tasks::{
        dto::{PageEnvelope, ALL_STATUSES, DEFAULT_PAGE, DEFAULT_PAGE_SIZE},
        repo_types::Task,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Login,
    Register,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub user: Option<Session>,
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub view: View,
    pub filter_status: String,
    pub search_keyword: String,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_tasks: u64,
    pub tasks_per_page: u64,
    /// Bumped by every completed create/update/delete.
    pub mutations: u64,
}

/// Everything the visible page depends on. A change means the page must be re-fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchKey {
    pub user_id: Uuid,
    pub filter_status: String,
    pub search_keyword: String,
    pub page: u64,
    pub page_size: u64,
    pub mutations: u64,
}

impl ClientState {
    pub fn new(restored: Option<Session>) -> Self {
        let view = if restored.is_some() {
            View::Dashboard
        } else {
            View::Login
        };
        Self {
            user: restored,
            tasks: Vec::new(),
            loading: false,
            error: None,
            view,
            filter_status: ALL_STATUSES.to_string(),
            search_keyword: String::new(),
            current_page: DEFAULT_PAGE,
            total_pages: 1,
            total_tasks: 0,
            tasks_per_page: DEFAULT_PAGE_SIZE,
            mutations: 0,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.token.as_str())
    }

    pub fn fetch_key(&self) -> Option<FetchKey> {
        let user = self.user.as_ref()?;
        Some(FetchKey {
            user_id: user.id,
            filter_status: self.filter_status.clone(),
            search_keyword: self.search_keyword.clone(),
            page: self.current_page,
            page_size: self.tasks_per_page,
            mutations: self.mutations,
        })
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    LoginSuccess(Session),
    Logout,
    SetTasks(PageEnvelope),
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    SetFilterStatus(String),
    SetSearchKeyword(String),
    SetPage(u64),
    SetView(View),
    ToggleAuthForm,
    SetLoading(bool),
    SetError(Option<String>),
}

/// State transition table. Pure: no I/O, no clocks.
pub fn reduce(state: ClientState, action: Action) -> ClientState {
    match action {
        Action::LoginSuccess(session) => ClientState {
            user: Some(session),
            error: None,
            view: View::Dashboard,
            ..state
        },
        Action::Logout => ClientState::new(None),
        Action::SetTasks(page) => ClientState {
            tasks: page.items,
            loading: false,
            current_page: page.page,
            total_pages: page.page_count,
            total_tasks: page.total_count,
            tasks_per_page: page.page_size,
            ..state
        },
        // The list is never patched locally; the bump forces a re-fetch.
        Action::TaskCreated | Action::TaskUpdated | Action::TaskDeleted => ClientState {
            mutations: state.mutations + 1,
            view: View::Dashboard,
            ..state
        },
        Action::SetFilterStatus(filter_status) => ClientState {
            filter_status,
            current_page: DEFAULT_PAGE,
            ..state
        },
        Action::SetSearchKeyword(search_keyword) => ClientState {
            search_keyword,
            current_page: DEFAULT_PAGE,
            ..state
        },
        Action::SetPage(page) => ClientState {
            current_page: page.max(DEFAULT_PAGE),
            ..state
        },
        Action::SetView(view) => ClientState { view, ..state },
        Action::ToggleAuthForm => {
            let view = match state.view {
                View::Login => View::Register,
                View::Register => View::Login,
                View::Dashboard => View::Dashboard,
            };
            ClientState { view, ..state }
        }
        Action::SetLoading(loading) => ClientState { loading, ..state },
        Action::SetError(error) => ClientState { error, ..state },
    }
}
