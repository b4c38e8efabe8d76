use std::sync::Arc;

use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};

use crate::auth::{
    claims::Claims,
    jwt::JwtKeys,
    password::{hash_password, verify_dummy, verify_password},
    repo::UserRepo,
    repo_types::{NewResetToken, User},
    reset::{generate_reset_token, hash_reset_token},
};
use crate::error::{AppError, AppResult};

/// Password checks, access tokens and the reset-token lifecycle.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserRepo>,
    keys: JwtKeys,
    reset_ttl: TimeDuration,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserRepo>, keys: JwtKeys, reset_ttl: TimeDuration) -> Self {
        Self {
            users,
            keys,
            reset_ttl,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Unknown email, wrong password and inactive account are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let Some(user) = self.users.find_by_email(email).await? else {
            verify_dummy(password);
            warn!("login for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login for inactive account");
            return Err(AppError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn issue_access_token(&self, user: &User) -> AppResult<String> {
        Ok(self.keys.sign_access(user)?)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        self.keys.verify(token)
    }

    pub async fn issue_password_reset_token(&self, user: &User) -> AppResult<String> {
        let raw = generate_reset_token();
        let token_hash = hash_reset_token(&raw);
        self.users
            .replace_reset_token(NewResetToken {
                user_id: user.id,
                token_hash: &token_hash,
                expires_at: OffsetDateTime::now_utc() + self.reset_ttl,
            })
            .await?;
        info!(user_id = %user.id, "password reset token issued");
        Ok(raw)
    }

    pub async fn redeem_password_reset_token(&self, token: &str, new_password: &str) -> AppResult<()> {
        let new_hash = hash_password(new_password)?;
        let redeemed = self
            .users
            .redeem_reset_token(&hash_reset_token(token), &new_hash, OffsetDateTime::now_utc())
            .await?;
        match redeemed {
            Some(user_id) => {
                info!(%user_id, "password changed via reset token");
                Ok(())
            }
            None => {
                warn!("reset token rejected");
                Err(AppError::InvalidOrExpiredToken)
            }
        }
    }
}
