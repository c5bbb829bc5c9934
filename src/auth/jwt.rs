use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{JwtConfig, MAX_TOKEN_TTL_MINUTES},
    state::AppState,
};

/// Bearer token payload. Stateless: nothing about the token is stored server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            // Config already rejects out-of-range values; clamp for hand-built configs.
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(0, MAX_TOKEN_TTL_MINUTES) as u64 * 60),
        }
    }

    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now
            .checked_add(TimeDuration::seconds(self.ttl.as_secs() as i64))
            .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}
