use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, normalize_email, registration_email, verify_password},
        repo::DUPLICATE_EMAIL,
        repo_types::{NewUser, Role, User},
    },
    error::{AppError, AppResult},
    state::AppState,
};

/// Same text for unknown email and wrong password.
pub const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Requested role at registration. Elevated roles need the operator switch.
fn resolve_role(requested: Option<&str>, allow_admin: bool) -> AppResult<Role> {
    let role = match requested {
        None | Some("") => Role::default(),
        Some(raw) => raw.parse::<Role>()?,
    };
    if role == Role::Admin && !allow_admin {
        return Err(AppError::InvalidInput(
            "Registering with the admin role is not allowed".into(),
        ));
    }
    Ok(role)
}

pub fn issue_token(keys: &JwtKeys, user: &User) -> AppResult<AuthResponse> {
    let token = keys.sign(user.id)?;
    Ok(AuthResponse {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
        token,
    })
}

pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<AuthResponse> {
    let email = registration_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::InvalidInput("Password is required".into()));
    }
    let role = resolve_role(req.role.as_deref(), state.config.allow_admin_registration)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict(DUPLICATE_EMAIL.into()));
    }

    let hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            email: &email,
            password_hash: &hash,
            role,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    issue_token(&state.keys(), &user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    info!(user_id = %user.id, "user logged in");
    issue_token(&state.keys(), &user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(email: &str, password: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            role: role.map(Into::into),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn role_resolution() {
        assert_eq!(resolve_role(None, false).unwrap(), Role::StandardUser);
        assert_eq!(resolve_role(Some(""), false).unwrap(), Role::StandardUser);
        assert_eq!(resolve_role(Some("standard_user"), false).unwrap(), Role::StandardUser);
        assert!(matches!(resolve_role(Some("admin"), false), Err(AppError::InvalidInput(_))));
        assert_eq!(resolve_role(Some("admin"), true).unwrap(), Role::Admin);
        assert!(matches!(resolve_role(Some("root"), true), Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn register_then_login_yields_a_verifiable_token() {
        let state = AppState::fake();
        let registered = register(&state, register_req(" New@Example.com ", "pw-123456", None))
            .await
            .unwrap();
        assert_eq!(registered.email, "new@example.com");
        assert_eq!(registered.role, Role::StandardUser);

        let logged_in = login(&state, login_req("new@example.com", "pw-123456")).await.unwrap();
        assert_eq!(logged_in.id, registered.id);
        let claims = state.keys().verify(&logged_in.token).unwrap();
        assert_eq!(claims.sub, registered.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let state = AppState::fake();
        register(&state, register_req("A@x.com", "pw", None)).await.unwrap();
        let err = register(&state, register_req("a@x.com", "pw", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = register(&state, register_req("A@X.COM", "other", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let state = AppState::fake();
        let err = register(&state, register_req("not-an-email", "pw", None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = register(&state, register_req("ok@x.com", "", None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = register(&state, register_req("ok@x.com", "pw", Some("admin"))).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn admin_registration_honours_operator_switch() {
        let state = AppState::fake_with(|cfg| cfg.allow_admin_registration = true);
        let res = register(&state, register_req("boss@x.com", "pw", Some("admin"))).await.unwrap();
        assert_eq!(res.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::fake();
        register(&state, register_req("u@x.com", "right", None)).await.unwrap();

        let unknown = login(&state, login_req("nobody@x.com", "right")).await.unwrap_err();
        let wrong = login(&state, login_req("u@x.com", "wrong")).await.unwrap_err();
        assert!(matches!(unknown, AppError::Unauthorized(_)));
        assert!(matches!(wrong, AppError::Unauthorized(_)));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }
}
