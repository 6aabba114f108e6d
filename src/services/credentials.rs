// src/services/credentials.rs
//! Credential store: all reads and writes of the users table.
//!
//! Every mutation is scoped to a single row, either by internal id or by
//! Google subject id. Token columns only ever hold values that came back
//! from a successful provider exchange.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::auth::models::User;
use crate::common::{generate_user_id, safe_email_log};
use crate::services::google::{IdentityClaims, TokenResponse};

#[derive(Debug, Clone)]
pub struct CredentialService {
    pool: SqlitePool,
}

impl CredentialService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_google_sub(&self, sub: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_sub = ?")
            .bind(sub)
            .fetch_optional(&self.pool)
            .await
    }

    /// Create-or-update by Google subject id after a code exchange.
    ///
    /// Profile fields and the access token are overwritten unconditionally.
    /// The refresh token is only replaced when Google sent a new one:
    /// on repeat consent Google often omits it, and nulling the stored one
    /// would silently break all future refreshes.
    pub async fn upsert_from_exchange(
        &self,
        claims: &IdentityClaims,
        tokens: &TokenResponse,
    ) -> Result<User, sqlx::Error> {
        let id = generate_user_id();
        let expires_at = tokens.expires_at().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, google_sub, email, name, avatar, access_token, refresh_token, token_expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(google_sub) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                avatar = excluded.avatar,
                access_token = excluded.access_token,
                token_expires_at = excluded.token_expires_at,
                refresh_token = COALESCE(excluded.refresh_token, refresh_token),
                updated_at = datetime('now')
            "#,
        )
        .bind(&id)
        .bind(&claims.sub)
        .bind(&claims.email)
        .bind(claims.name.as_deref())
        .bind(claims.picture.as_deref())
        .bind(&tokens.access_token)
        .bind(tokens.refresh_token.as_deref())
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_sub = ?")
            .bind(&claims.sub)
            .fetch_one(&self.pool)
            .await?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "Stored Google credential from code exchange"
        );

        Ok(user)
    }

    /// Persist the outcome of a successful token refresh
    pub async fn apply_refresh(
        &self,
        user_id: &str,
        tokens: &TokenResponse,
    ) -> Result<(), sqlx::Error> {
        let expires_at = tokens.expires_at().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE users SET
                access_token = ?,
                token_expires_at = ?,
                refresh_token = COALESCE(?, refresh_token),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&tokens.access_token)
        .bind(&expires_at)
        .bind(tokens.refresh_token.as_deref())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user_id, "Persisted refreshed access token");
        Ok(())
    }

    /// Null out the token columns. Local lockout must succeed even when the
    /// remote revocation did not.
    pub async fn clear_tokens(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users SET
                access_token = NULL,
                refresh_token = NULL,
                token_expires_at = NULL,
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, "Cleared stored Google tokens");
        Ok(())
    }

    pub async fn update_preferences(
        &self,
        user_id: &str,
        notify_email: bool,
        notify_push: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET notify_email = ?, notify_push = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(notify_email)
        .bind(notify_push)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the user row and every resource keyed to it.
    ///
    /// SQLite foreign keys are not enforced by default, so the cascade is an
    /// explicit multi-statement delete in reverse dependency order.
    pub async fn delete_account(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM reminders WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM notes WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id = %user_id, "Deleted user account and owned resources");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> CredentialService {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        CredentialService::new(pool)
    }

    fn claims() -> IdentityClaims {
        IdentityClaims {
            sub: "google-sub-1".to_string(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            picture: Some("https://example.com/a.png".to_string()),
        }
    }

    fn tokens(access: &str, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in: 3600,
            id_token: None,
            token_type: Some("Bearer".to_string()),
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let store = setup().await;

        let first = store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();

        // Second login with the same subject must update, never duplicate
        let second = store
            .upsert_from_exchange(&claims(), &tokens("A2", Some("R2")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token.as_deref(), Some("A2"));
        assert_eq!(second.refresh_token.as_deref(), Some("R2"));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_refresh_token_when_omitted() {
        let store = setup().await;

        store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();

        // Repeat consent without a reissued refresh token
        let user = store
            .upsert_from_exchange(&claims(), &tokens("A2", None))
            .await
            .unwrap();

        assert_eq!(user.access_token.as_deref(), Some("A2"));
        assert_eq!(user.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_apply_refresh_preserves_refresh_token() {
        let store = setup().await;
        let user = store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();

        store
            .apply_refresh(&user.id, &tokens("A2", None))
            .await
            .unwrap();

        let after = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(after.access_token.as_deref(), Some("A2"));
        assert_eq!(after.refresh_token.as_deref(), Some("R1"));
        assert!(after.token_expiry().is_some());
    }

    #[tokio::test]
    async fn test_clear_tokens_nulls_all_three_columns() {
        let store = setup().await;
        let user = store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();

        store.clear_tokens(&user.id).await.unwrap();

        let after = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(after.access_token.is_none());
        assert!(after.refresh_token.is_none());
        assert!(after.token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_delete_account_cascades_to_owned_resources() {
        let store = setup().await;
        let user = store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();

        sqlx::query("INSERT INTO notes (id, user_id, title, body) VALUES ('N_X', ?, 't', 'b')")
            .bind(&user.id)
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO reminders (id, user_id, title) VALUES ('R_X', ?, 't')")
            .bind(&user.id)
            .execute(&store.pool)
            .await
            .unwrap();

        store.delete_account(&user.id).await.unwrap();

        let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let notes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let reminders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reminders")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!((users.0, notes.0, reminders.0), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_new_user_defaults_preferences() {
        let store = setup().await;
        let user = store
            .upsert_from_exchange(&claims(), &tokens("A1", Some("R1")))
            .await
            .unwrap();
        assert!(user.notify_email);
        assert!(!user.notify_push);
    }
}
