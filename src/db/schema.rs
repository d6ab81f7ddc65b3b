//! Program-managed schema
//!
//! Every statement is idempotent, so `init` can run on every connect.
//! Uniqueness constraints here are what make the pipeline's persistence
//! steps safe to repeat: one track per catalog id, one download per
//! (user, track), one channel entry per artist key.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        username    TEXT NOT NULL UNIQUE,
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        catalog_id   TEXT UNIQUE,
        title        TEXT NOT NULL,
        artist       TEXT,
        album        TEXT,
        year         INTEGER,
        duration_ms  INTEGER,
        track_number INTEGER,
        disc_number  INTEGER,
        isrc         TEXT,
        checksum     TEXT,
        created_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artist_channels (
        artist_key   TEXT PRIMARY KEY,
        channel_url  TEXT NOT NULL,
        verified_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS downloads (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id        INTEGER NOT NULL REFERENCES users(id),
        track_id       INTEGER NOT NULL REFERENCES tracks(id),
        remote_id      TEXT,
        file_path      TEXT NOT NULL,
        checksum       TEXT NOT NULL,
        bitrate        INTEGER NOT NULL,
        filesize_bytes INTEGER,
        created_at     TEXT NOT NULL,
        UNIQUE(user_id, track_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_history (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id     INTEGER NOT NULL REFERENCES users(id),
        track_id    INTEGER NOT NULL REFERENCES tracks(id),
        action      TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
];

/// Create any missing tables
pub async fn init(pool: &SqlitePool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to initialize database schema")?;
    }
    Ok(())
}
