use axum::async_trait;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::auth::repo_types::User;

const TOKEN_LEN: usize = 32;

/// Raw token handed to the user. Only its hash is persisted.
pub fn generate_reset_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Delivers a freshly issued reset token to the account owner.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_token(&self, user: &User, token: &str) -> anyhow::Result<()>;
}

/// Development stand-in for a mail gateway. The link carries the raw
/// token, so it is only written at `debug`; `info` records the user id.
pub struct LogNotifier {
    pub link_base: String,
}

impl LogNotifier {
    fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.link_base.trim_end_matches('/'), token)
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_token(&self, user: &User, token: &str) -> anyhow::Result<()> {
        info!(user_id = %user.id, "password reset requested");
        debug!(user_id = %user.id, link = %self.reset_link(token), "password reset link");
        Ok(())
    }
}
