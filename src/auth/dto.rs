use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::Role;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by register and login; the client keeps it as its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
}
