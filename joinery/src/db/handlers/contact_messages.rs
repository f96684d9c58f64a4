//! Database repository for contact-form messages and their delivery state.

use crate::db::{
    errors::{DbError, Result},
    models::contact_messages::{ContactMessageCreateDBRequest, ContactMessageDBResponse, ContactMessageRow, MessageStatus},
};
use crate::types::{MessageId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct ContactMessages<'c> {
    db: &'c mut PgConnection,
}

fn into_response(row: ContactMessageRow) -> Result<ContactMessageDBResponse> {
    ContactMessageDBResponse::try_from(row).map_err(|e| DbError::Other(anyhow::anyhow!(e)))
}

impl<'c> ContactMessages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Store a new message in `pending`
    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &ContactMessageCreateDBRequest) -> Result<ContactMessageDBResponse> {
        let row = sqlx::query_as::<_, ContactMessageRow>(
            r#"
            INSERT INTO contact_messages (id, name, email, phone, message, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.message)
        .bind(MessageStatus::Pending.as_str())
        .fetch_one(&mut *self.db)
        .await?;
        into_response(row)
    }

    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: MessageId) -> Result<Option<ContactMessageDBResponse>> {
        let row = sqlx::query_as::<_, ContactMessageRow>("SELECT * FROM contact_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        row.map(into_response).transpose()
    }

    /// Newest first
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<ContactMessageDBResponse>> {
        let rows = sqlx::query_as::<_, ContactMessageRow>(
            "SELECT * FROM contact_messages ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        rows.into_iter().map(into_response).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contact_messages")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_sent(&mut self, id: MessageId, provider_message_id: &str) -> Result<ContactMessageDBResponse> {
        let row = sqlx::query_as::<_, ContactMessageRow>(
            r#"
            UPDATE contact_messages
            SET status = $2, provider_message_id = $3, error = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(MessageStatus::Sent.as_str())
        .bind(provider_message_id)
        .fetch_one(&mut *self.db)
        .await?;
        into_response(row)
    }

    #[instrument(skip(self, error), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_failed(&mut self, id: MessageId, error: &str) -> Result<ContactMessageDBResponse> {
        let row = sqlx::query_as::<_, ContactMessageRow>(
            "UPDATE contact_messages SET status = $2, error = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(MessageStatus::Failed.as_str())
        .bind(error)
        .fetch_one(&mut *self.db)
        .await?;
        into_response(row)
    }

    /// Apply a provider delivery event. Returns the number of messages updated; zero when the
    /// provider id is unknown.
    #[instrument(skip(self, error), err)]
    pub async fn update_status_by_provider_id(
        &mut self,
        provider_message_id: &str,
        status: MessageStatus,
        error: Option<&str>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE contact_messages
            SET status = $2, error = COALESCE($3, error), updated_at = NOW()
            WHERE provider_message_id = $1
            "#,
        )
        .bind(provider_message_id)
        .bind(status.as_str())
        .bind(error)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
