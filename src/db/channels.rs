//! Artist channel cache repository
//!
//! Maps a normalized artist key to a previously discovered official
//! channel. Entries are upserted (last writer wins) and never expire;
//! losing one only costs a slower future resolution.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Cached channel entry for one artist
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelEntry {
    pub artist_key: String,
    pub channel_url: String,
    pub verified_at: DateTime<Utc>,
}

pub struct ChannelRepository {
    pool: SqlitePool,
}

impl ChannelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the cached channel for a normalized artist key
    pub async fn lookup(&self, artist_key: &str) -> Result<Option<String>> {
        let url = sqlx::query_scalar::<_, String>(
            "SELECT channel_url FROM artist_channels WHERE artist_key = ?",
        )
        .bind(artist_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(url)
    }

    /// Insert or overwrite the channel for a normalized artist key
    pub async fn upsert(&self, artist_key: &str, channel_url: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artist_channels (artist_key, channel_url, verified_at)
            VALUES (?, ?, ?)
            ON CONFLICT(artist_key) DO UPDATE SET
                channel_url = excluded.channel_url,
                verified_at = excluded.verified_at
            "#,
        )
        .bind(artist_key)
        .bind(channel_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Full entry, for inspection
    pub async fn get(&self, artist_key: &str) -> Result<Option<ChannelEntry>> {
        let entry = sqlx::query_as::<_, ChannelEntry>(
            "SELECT artist_key, channel_url, verified_at FROM artist_channels WHERE artist_key = ?",
        )
        .bind(artist_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_lookup_absent() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.channels().lookup("coldplay").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_then_lookup_returns_latest() {
        let db = Database::connect_in_memory().await.unwrap();
        let channels = db.channels();

        channels
            .upsert("coldplay", "https://youtube.com/channel/old")
            .await
            .unwrap();
        channels
            .upsert("coldplay", "https://youtube.com/channel/new")
            .await
            .unwrap();

        assert_eq!(
            channels.lookup("coldplay").await.unwrap().as_deref(),
            Some("https://youtube.com/channel/new")
        );

        // One row per key, not one per upsert
        let entry = channels.get("coldplay").await.unwrap().unwrap();
        assert_eq!(entry.channel_url, "https://youtube.com/channel/new");
    }
}
