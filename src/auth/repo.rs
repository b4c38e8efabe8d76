use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewResetToken, NewUser, User};
use crate::db::RepoResult;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    /// Fails with `UniqueViolation` when the email is taken.
    async fn create(&self, new: NewUser<'_>) -> RepoResult<User>;

    /// Consumes every outstanding token of the user and stores the new one.
    async fn replace_reset_token(&self, token: NewResetToken<'_>) -> RepoResult<()>;

    /// Consumes the token if it is outstanding and unexpired at `now`, and
    /// sets the owner's password hash, atomically. Returns the owner's id,
    /// or `None` when the token was unknown, expired or already consumed.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<Uuid>>;
}

const USER_COLUMNS: &str = "id, email, username, password_hash, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.email)
        .bind(new.username)
        .bind(new.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn replace_reset_token(&self, token: NewResetToken<'_>) -> RepoResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE password_reset_tokens
               SET consumed_at = now()
             WHERE user_id = $1 AND consumed_at IS NULL
            "#,
        )
        .bind(token.user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(token.token_hash)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<Uuid>> {
        let mut tx = self.db.begin().await?;

        // The row lock taken here makes a concurrent redeemer wait, then
        // re-check the predicate and find the token consumed.
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens
               SET consumed_at = $2
             WHERE token_hash = $1
               AND consumed_at IS NULL
               AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(new_password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(user_id))
    }
}
