//! Database repository for site settings (a flat key/value table).

use crate::db::{errors::Result, models::site_settings::SiteSettingDBResponse};
use sqlx::{Connection, PgConnection};
use std::collections::BTreeMap;
use tracing::instrument;

pub struct SiteSettings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SiteSettings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<SiteSettingDBResponse>> {
        let settings = sqlx::query_as::<_, SiteSettingDBResponse>("SELECT * FROM site_settings ORDER BY key")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(settings)
    }

    /// Stored settings as a key/value map
    pub async fn get_all(&mut self) -> Result<BTreeMap<String, String>> {
        Ok(self.list().await?.into_iter().map(|s| (s.key, s.value)).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM site_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(value)
    }

    /// Insert or overwrite every pair, all or nothing
    #[instrument(skip(self, values), fields(count = values.len()), err)]
    pub async fn upsert_many(&mut self, values: &BTreeMap<String, String>) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for (key, value) in values {
            sqlx::query(
                r#"
                INSERT INTO site_settings (key, value, updated_at) VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
