//! Database repository for users.
//!
//! Users only come into existence through sign-in, so there is no general create/update. The
//! admin flag is never touched by sign-in; it is set by [`Users::ensure_admins`] at startup or
//! directly in the database.

use crate::db::{
    errors::Result,
    models::users::{OAuthProfile, UserDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create or refresh the user for a sign-in and link the provider account.
    ///
    /// Users are matched by (lowercased) email. Name and image are refreshed from the profile
    /// when the provider sends them, and `last_login` is set.
    #[instrument(skip(self, profile), fields(provider = %profile.provider), err)]
    pub async fn upsert_from_oauth(&mut self, profile: &OAuthProfile) -> Result<UserDBResponse> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (id, email, name, image, last_login)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                image = COALESCE(EXCLUDED.image, users.image),
                last_login = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile.email.trim().to_lowercase())
        .bind(&profile.name)
        .bind(&profile.image)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (provider, provider_account_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_account_id) DO NOTHING
            "#,
        )
        .bind(&profile.provider)
        .bind(&profile.provider_account_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    /// Make sure every listed email has an admin user, creating placeholders for people who
    /// have not signed in yet. Returns how many rows changed.
    #[instrument(skip(self, emails), fields(count = emails.len()), err)]
    pub async fn ensure_admins(&mut self, emails: &[String]) -> Result<u64> {
        let mut changed = 0;
        for email in emails {
            let email = email.trim().to_lowercase();
            if email.is_empty() {
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO users (id, email, is_admin) VALUES ($1, $2, TRUE)
                ON CONFLICT (email) DO UPDATE SET is_admin = TRUE, updated_at = NOW()
                WHERE users.is_admin = FALSE
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&email)
            .execute(&mut *self.db)
            .await?;
            changed += result.rows_affected();
        }
        Ok(changed)
    }
}
