//! Headless client for the task API: the view/filter state machine, a typed
//! HTTP client, session persistence, and a controller that keeps the visible
//! page in sync.

pub mod api;
pub mod dashboard;
pub mod session;
pub mod state;

pub use crate::auth::dto::AuthResponse as Session;
