//! Canonical track description as received from a catalog export
//!
//! A descriptor is read-only input to the pipeline: built once by the
//! caller, never mutated downstream. It is distinct from the persisted
//! `tracks` row, which gets an id on first insert.

use serde::{Deserialize, Serialize};

/// A track as described by the source catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Stable source-catalog id, when the export carried one
    #[serde(default)]
    pub catalog_id: Option<String>,

    /// Track title
    pub title: String,

    /// Performing artists, primary first
    #[serde(default)]
    pub artists: Vec<String>,

    #[serde(default)]
    pub album: Option<String>,

    /// Release year
    #[serde(default)]
    pub year: Option<i64>,

    #[serde(default)]
    pub duration_ms: Option<i64>,

    #[serde(default)]
    pub track_number: Option<i64>,

    #[serde(default)]
    pub disc_number: Option<i64>,

    /// International Standard Recording Code
    #[serde(default)]
    pub isrc: Option<String>,
}

impl TrackDescriptor {
    /// The primary artist, if any non-empty artist name is present
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists
            .iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty())
    }

    /// All artist names joined for tag/display purposes
    pub fn artist_display(&self) -> Option<String> {
        let joined = self
            .artists
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// "Artist - Title" when an artist is known, plain title otherwise
    pub fn display(&self) -> String {
        match self.primary_artist() {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_artist_skips_blank_names() {
        let track = TrackDescriptor {
            catalog_id: None,
            title: "Yellow".to_string(),
            artists: vec!["  ".to_string(), "Coldplay".to_string()],
            album: None,
            year: None,
            duration_ms: None,
            track_number: None,
            disc_number: None,
            isrc: None,
        };
        assert_eq!(track.primary_artist(), Some("Coldplay"));
        assert_eq!(track.display(), "Coldplay - Yellow");
    }

    #[test]
    fn test_display_without_artist() {
        let track = TrackDescriptor {
            catalog_id: None,
            title: "Yellow".to_string(),
            artists: vec![],
            album: None,
            year: None,
            duration_ms: None,
            track_number: None,
            disc_number: None,
            isrc: None,
        };
        assert_eq!(track.primary_artist(), None);
        assert_eq!(track.display(), "Yellow");
    }
}
