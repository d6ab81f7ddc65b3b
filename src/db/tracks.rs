//! Catalog track repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::track::TrackDescriptor;

/// Persisted catalog track row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogTrackRecord {
    pub id: i64,
    pub catalog_id: Option<String>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i64>,
    pub duration_ms: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub isrc: Option<String>,
    /// Content hash of the most recently downloaded asset
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct TrackRepository {
    pool: SqlitePool,
}

impl TrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a track by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<CatalogTrackRecord>> {
        let record = sqlx::query_as::<_, CatalogTrackRecord>(
            r#"
            SELECT id, catalog_id, title, artist, album, year, duration_ms,
                   track_number, disc_number, isrc, checksum, created_at
            FROM tracks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Resolve a descriptor to an existing row id, inserting one if absent.
    ///
    /// Lookup is by external catalog id when the descriptor has one, falling
    /// back to an exact (title, artist) match so descriptors without an id
    /// stay idempotent across repeated runs.
    pub async fn get_or_create(&self, track: &TrackDescriptor) -> Result<i64> {
        if let Some(existing) = self.find_existing(track).await? {
            return Ok(existing);
        }

        sqlx::query(
            r#"
            INSERT INTO tracks (catalog_id, title, artist, album, year, duration_ms,
                                track_number, disc_number, isrc, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(catalog_id) DO NOTHING
            "#,
        )
        .bind(&track.catalog_id)
        .bind(&track.title)
        .bind(track.artist_display())
        .bind(&track.album)
        .bind(track.year)
        .bind(track.duration_ms)
        .bind(track.track_number)
        .bind(track.disc_number)
        .bind(&track.isrc)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = self
            .find_existing(track)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Track row missing after insert: {}", track.display()))?;

        Ok(id)
    }

    /// Set/refresh the content checksum on a track
    pub async fn set_checksum(&self, id: i64, checksum: &str) -> Result<()> {
        sqlx::query("UPDATE tracks SET checksum = ? WHERE id = ?")
            .bind(checksum)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_existing(&self, track: &TrackDescriptor) -> Result<Option<i64>> {
        if let Some(ref catalog_id) = track.catalog_id {
            let id = sqlx::query_scalar::<_, i64>("SELECT id FROM tracks WHERE catalog_id = ?")
                .bind(catalog_id)
                .fetch_optional(&self.pool)
                .await?;
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM tracks WHERE catalog_id IS NULL AND title = ? AND artist IS ?",
        )
        .bind(&track.title)
        .bind(track.artist_display())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }
}
