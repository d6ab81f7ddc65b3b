//! User repository

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the id for `username`, creating the row if absent
    pub async fn get_or_create(&self, username: &str) -> Result<i64> {
        if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(id);
        }

        // Another writer may have inserted between the lookup and here;
        // ON CONFLICT keeps the insert idempotent either way.
        sqlx::query("INSERT INTO users (username, created_at) VALUES (?, ?) ON CONFLICT(username) DO NOTHING")
            .bind(username)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }
}
