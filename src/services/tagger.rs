//! Metadata tagging via lofty
//!
//! Writes catalog metadata into the downloaded file's native tag format
//! (iTunes-style atoms for m4a). Existing tags from the remote source are
//! kept as a base and overwritten field by field, so embedded cover art
//! survives.

use std::path::Path;

use anyhow::{Context, Result};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::prelude::{Accessor, ItemKey, TagExt};
use lofty::probe::Probe;
use lofty::tag::Tag;

use crate::track::TrackDescriptor;

/// Fields written into the file's primary tag. Empty options are left as
/// whatever the file already carried.
#[derive(Debug, Default, Clone)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub isrc: Option<String>,
    pub comment: Option<String>,
}

impl TagFields {
    pub fn from_descriptor(track: &TrackDescriptor) -> Self {
        Self {
            title: Some(track.title.clone()),
            artist: track.artist_display(),
            album: track.album.clone(),
            year: track.year.and_then(|y| u32::try_from(y).ok()),
            track_number: track.track_number.and_then(|n| u32::try_from(n).ok()),
            disc_number: track.disc_number.and_then(|n| u32::try_from(n).ok()),
            isrc: track.isrc.clone(),
            comment: None,
        }
    }
}

/// Overwrite the file's primary tag with `fields`. Blocking: callers on an
/// async runtime should wrap this in `spawn_blocking`.
pub fn write_tags(path: &Path, fields: &TagFields) -> Result<()> {
    let tagged = Probe::open(path)
        .with_context(|| format!("Failed to open {} for tagging", path.display()))?
        .read()
        .with_context(|| format!("Failed to parse {} for tagging", path.display()))?;

    let mut tag = match tagged.primary_tag() {
        Some(existing) => existing.clone(),
        None => Tag::new(tagged.primary_tag_type()),
    };

    if let Some(title) = &fields.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &fields.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &fields.album {
        tag.set_album(album.clone());
    }
    if let Some(year) = fields.year {
        tag.set_year(year);
    }
    if let Some(track_number) = fields.track_number {
        tag.set_track(track_number);
    }
    if let Some(disc_number) = fields.disc_number {
        tag.set_disk(disc_number);
    }
    if let Some(isrc) = &fields.isrc {
        tag.insert_text(ItemKey::Isrc, isrc.clone());
    }
    if let Some(comment) = &fields.comment {
        tag.set_comment(comment.clone());
    }

    tag.save_to_path(path, WriteOptions::default())
        .with_context(|| format!("Failed to write tags to {}", path.display()))?;
    Ok(())
}
