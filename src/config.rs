use anyhow::Context;
use axum::http::HeaderValue;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    /// The only origin CORS lets through.
    pub client_origin: HeaderValue,
    /// Operator switch: when false, `role: "admin"` is refused at registration.
    pub allow_admin_registration: bool,
}

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30 * 24 * 60;
/// Ten years. Keeps `exp` well inside what `OffsetDateTime` and `usize` can hold.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskdesk-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };
        let client_url =
            std::env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".into());
        let client_origin = HeaderValue::from_str(client_url.trim_end_matches('/'))
            .with_context(|| format!("CLIENT_URL is not a valid origin: {client_url}"))?;

        Ok(Self {
            database_url,
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5000),
            client_origin,
            allow_admin_registration: std::env::var("ALLOW_ADMIN_REGISTRATION")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        })
    }
}

fn parse_ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_TOKEN_TTL_MINUTES);
    };
    let minutes: i64 = raw
        .parse()
        .with_context(|| format!("JWT_TTL_MINUTES is not a number: {raw}"))?;
    anyhow::ensure!(
        (1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) && minutes.checked_mul(60).is_some(),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
