//! Download record repository and history log

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Persisted download row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DownloadRecord {
    pub id: i64,
    pub user_id: i64,
    pub track_id: i64,
    pub remote_id: Option<String>,
    pub file_path: String,
    pub checksum: String,
    pub bitrate: i64,
    pub filesize_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a download
#[derive(Debug)]
pub struct CreateDownload {
    pub user_id: i64,
    pub track_id: i64,
    pub remote_id: Option<String>,
    pub file_path: String,
    pub checksum: String,
    pub bitrate: i64,
    pub filesize_bytes: Option<i64>,
}

pub struct DownloadRepository {
    pool: SqlitePool,
}

impl DownloadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a download row, ignoring the insert when one already exists
    /// for the same (user, track). Returns the surviving row's id either way.
    pub async fn insert_ignoring_duplicates(&self, input: CreateDownload) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO downloads (user_id, track_id, remote_id, file_path,
                                   checksum, bitrate, filesize_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, track_id) DO NOTHING
            "#,
        )
        .bind(input.user_id)
        .bind(input.track_id)
        .bind(&input.remote_id)
        .bind(&input.file_path)
        .bind(&input.checksum)
        .bind(input.bitrate)
        .bind(input.filesize_bytes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM downloads WHERE user_id = ? AND track_id = ?",
        )
        .bind(input.user_id)
        .bind(input.track_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Fetch the download row for a (user, track) pair
    pub async fn get_by_user_track(
        &self,
        user_id: i64,
        track_id: i64,
    ) -> Result<Option<DownloadRecord>> {
        let record = sqlx::query_as::<_, DownloadRecord>(
            r#"
            SELECT id, user_id, track_id, remote_id, file_path, checksum,
                   bitrate, filesize_bytes, created_at
            FROM downloads
            WHERE user_id = ? AND track_id = ?
            "#,
        )
        .bind(user_id)
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Number of download rows for a (user, track) pair
    pub async fn count_for_user_track(&self, user_id: i64, track_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM downloads WHERE user_id = ? AND track_id = ?",
        )
        .bind(user_id)
        .bind(track_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Append an action to the user history log
    pub async fn append_history(&self, user_id: i64, track_id: i64, action: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_history (user_id, track_id, action, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(track_id)
        .bind(action)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CreateDownload;
    use crate::db::Database;
    use crate::track::TrackDescriptor;

    fn create_input(user_id: i64, track_id: i64, checksum: &str) -> CreateDownload {
        CreateDownload {
            user_id,
            track_id,
            remote_id: Some("dQw4w9WgXcQ".to_string()),
            file_path: "/downloads/Yellow.m4a".to_string(),
            checksum: checksum.to_string(),
            bitrate: 192,
            filesize_bytes: Some(4_200_000),
        }
    }

    async fn seed(db: &Database) -> (i64, i64) {
        let user_id = db.users().get_or_create("michael").await.unwrap();
        let track_id = db
            .tracks()
            .get_or_create(&TrackDescriptor {
                catalog_id: Some("sp:1".to_string()),
                title: "Yellow".to_string(),
                artists: vec!["Coldplay".to_string()],
                album: None,
                year: None,
                duration_ms: None,
                track_number: None,
                disc_number: None,
                isrc: None,
            })
            .await
            .unwrap();
        (user_id, track_id)
    }

    #[tokio::test]
    async fn test_duplicate_insert_keeps_one_row() {
        let db = Database::connect_in_memory().await.unwrap();
        let (user_id, track_id) = seed(&db).await;
        let downloads = db.downloads();

        let first = downloads
            .insert_ignoring_duplicates(create_input(user_id, track_id, "aaa"))
            .await
            .unwrap();
        let second = downloads
            .insert_ignoring_duplicates(create_input(user_id, track_id, "bbb"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            downloads
                .count_for_user_track(user_id, track_id)
                .await
                .unwrap(),
            1
        );

        // The original row survives; the ignored insert does not overwrite it
        let record = downloads
            .get_by_user_track(user_id, track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.checksum, "aaa");
    }

    #[tokio::test]
    async fn test_append_history() {
        let db = Database::connect_in_memory().await.unwrap();
        let (user_id, track_id) = seed(&db).await;

        db.downloads()
            .append_history(user_id, track_id, "downloaded")
            .await
            .unwrap();
        db.downloads()
            .append_history(user_id, track_id, "downloaded")
            .await
            .unwrap();

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_history")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
