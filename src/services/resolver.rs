//! Candidate resolution: track description -> one accepted remote video
//!
//! Resolution is heuristic matching over noisy search results. Visual
//! releases ("music video", "official video") are rejected outright; plain
//! audio uploads ("lyric", "official audio") are preferred. A previously
//! discovered artist channel biases queries toward that channel's catalog.
//!
//! The channel heuristic is fuzzy and occasionally wrong; it only narrows
//! the search space and is never required for a correct match.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::PipelineError;
use crate::services::search::{HitKind, SearchBackend, SearchHit};
use crate::track::TrackDescriptor;

/// Phrases that denote a visual release; candidates carrying one in the
/// title or description are rejected
const BANNED_PHRASES: &[&str] = &["music video", "official video"];

/// Phrases that denote a plain-audio upload
const PREFERRED_PHRASES: &[&str] = &["lyric", "official audio"];

/// Marketing tokens stripped from artist/channel names before comparison
static MARKETING_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(vevo|topic|official|music|channel)\b").unwrap());

/// Tunable constants for resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Results requested per search query
    pub search_results: usize,
    /// Minimum name similarity for accepting a discovered channel
    pub channel_similarity_floor: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_results: 5,
            channel_similarity_floor: 0.5,
        }
    }
}

/// Result of a successful resolution
#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    /// Webpage reference of the accepted candidate
    pub url: String,
    /// Remote id of the accepted candidate, when the search carried one
    pub remote_id: Option<String>,
    /// Channel reference used or discovered during resolution
    pub channel_url: Option<String>,
}

pub struct CandidateResolver {
    backend: Arc<dyn SearchBackend>,
    db: Database,
    config: ResolverConfig,
}

impl CandidateResolver {
    pub fn new(backend: Arc<dyn SearchBackend>, db: Database, config: ResolverConfig) -> Self {
        Self {
            backend,
            db,
            config,
        }
    }

    /// Resolve a track to its best matching remote video.
    ///
    /// `NoMatchFound` is the only error this returns: search failures are
    /// logged and skipped, and cache failures are treated as cache misses.
    pub async fn resolve(&self, track: &TrackDescriptor) -> Result<ResolvedMatch, PipelineError> {
        let title = track.title.trim();
        if title.is_empty() {
            warn!(track = %track.display(), "Track has no title, nothing to resolve");
            return Err(PipelineError::NoMatchFound);
        }

        let artist = track.primary_artist();
        let channel_url = match artist {
            Some(artist) => self.find_or_cache_channel(artist).await,
            None => None,
        };

        let queries = build_queries(title, artist, channel_url.as_deref());
        let mut best: Option<(i64, SearchHit)> = None;

        for query in &queries {
            let hits = match self.backend.search(query, self.config.search_results).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "Search query failed, skipping");
                    continue;
                }
            };

            for hit in hits {
                if hit.kind != HitKind::Video {
                    continue;
                }
                let Some(score) = score_candidate(&hit, title, artist) else {
                    continue;
                };
                // Strictly-greater keeps the earliest of tied candidates,
                // so identical inputs always resolve identically
                if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                    best = Some((score, hit));
                }
            }

            // Stop querying once anything was accepted
            if best.is_some() {
                break;
            }
        }

        match best {
            Some((score, hit)) => {
                info!(
                    track = %track.display(),
                    url = %hit.url,
                    uploader = %hit.uploader,
                    score = score,
                    "Accepted candidate"
                );
                Ok(ResolvedMatch {
                    url: hit.url,
                    remote_id: if hit.id.is_empty() {
                        None
                    } else {
                        Some(hit.id)
                    },
                    channel_url,
                })
            }
            None => {
                debug!(track = %track.display(), queries = queries.len(), "No acceptable candidate");
                Err(PipelineError::NoMatchFound)
            }
        }
    }

    /// Get the artist's channel, searching for and caching it on a miss.
    ///
    /// Absence is normal: resolution proceeds without a channel bias.
    async fn find_or_cache_channel(&self, artist: &str) -> Option<String> {
        let key = normalize_artist_key(artist);
        if key.is_empty() {
            return None;
        }

        match self.db.channels().lookup(&key).await {
            Ok(Some(url)) => return Some(url),
            Ok(None) => {}
            Err(e) => {
                // A broken cache only slows resolution down
                warn!(artist = %artist, error = %e, "Channel cache lookup failed, proceeding without");
            }
        }

        let query = format!("{artist} official channel");
        let hits = match self.backend.search(&query, 5).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(artist = %artist, error = %e, "Channel search failed");
                return None;
            }
        };

        let mut best_url = None;
        let mut best_similarity = 0.0;
        for hit in hits {
            if hit.kind != HitKind::Channel {
                continue;
            }
            let similarity = strsim::normalized_levenshtein(&key, &normalize_artist_key(&hit.title));
            if similarity > best_similarity {
                best_similarity = similarity;
                best_url = Some(hit.url);
            }
        }

        if best_similarity < self.config.channel_similarity_floor {
            debug!(artist = %artist, "No convincing channel found");
            return None;
        }

        let url = best_url?;
        if let Err(e) = self.db.channels().upsert(&key, &url).await {
            warn!(artist = %artist, error = %e, "Failed to cache channel");
        } else {
            info!(artist = %artist, channel = %url, similarity = best_similarity, "Cached artist channel");
        }
        Some(url)
    }
}

/// Normalize an artist or channel name into a cache key: lowercase, strip
/// marketing tokens, keep ASCII alphanumerics only (accented characters
/// fall away with the rest)
pub fn normalize_artist_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = MARKETING_TOKENS.replace_all(&lowered, "");
    stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Build the query ladder, most specific first. Channel-biased copies come
/// before unbiased ones when a channel is known.
fn build_queries(title: &str, artist: Option<&str>, channel_url: Option<&str>) -> Vec<String> {
    let base: Vec<String> = match artist {
        Some(artist) => vec![
            format!("{title} {artist} lyrics"),
            format!("{title} {artist} official audio"),
            format!("{title} {artist}"),
        ],
        None => vec![format!("{title} lyrics"), title.to_string()],
    };

    match channel_url {
        Some(channel) => {
            let mut queries: Vec<String> =
                base.iter().map(|q| format!("{channel} {q}")).collect();
            queries.extend(base);
            queries
        }
        None => base,
    }
}

/// Score an acceptable candidate, or reject it with `None`.
///
/// Rejection: a banned phrase in title or description, a title token
/// missing from the combined text, or (when an artist is known) no artist
/// phrase in the combined text. Weights carried over from the source
/// heuristics: +3 preferred phrase in title, +2 artist in title, +2 all
/// title tokens present.
fn score_candidate(hit: &SearchHit, title: &str, artist: Option<&str>) -> Option<i64> {
    let hit_title = hit.title.to_lowercase();
    let description = hit.description.to_lowercase();
    let combined = format!("{} {} {}", hit_title, description, hit.uploader.to_lowercase());

    if BANNED_PHRASES
        .iter()
        .any(|p| hit_title.contains(p) || description.contains(p))
    {
        return None;
    }

    let title_lower = title.to_lowercase();
    if !title_lower
        .split_whitespace()
        .all(|token| combined.contains(token))
    {
        return None;
    }

    let artist_lower = artist.map(|a| a.to_lowercase());
    if let Some(ref artist) = artist_lower {
        if !combined.contains(artist.as_str()) {
            return None;
        }
    }

    let mut score = 2; // all title tokens present
    if PREFERRED_PHRASES.iter().any(|p| hit_title.contains(p)) {
        score += 3;
    }
    if let Some(ref artist) = artist_lower {
        if hit_title.contains(artist.as_str()) {
            score += 2;
        }
    }

    Some(score)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::Result;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    fn video(id: &str, title: &str, uploader: &str) -> SearchHit {
        SearchHit {
            kind: HitKind::Video,
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            uploader: uploader.to_string(),
            url: format!("https://www.youtube.com/watch?v={id}"),
        }
    }

    fn channel(title: &str, url: &str) -> SearchHit {
        SearchHit {
            kind: HitKind::Channel,
            id: String::new(),
            title: title.to_string(),
            description: String::new(),
            uploader: String::new(),
            url: url.to_string(),
        }
    }

    /// Backend serving canned hits per exact query, recording every query
    struct MockBackend {
        responses: HashMap<String, Vec<SearchHit>>,
        fallback: Vec<SearchHit>,
        queries: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn with_fallback(fallback: Vec<SearchHit>) -> Self {
            Self {
                responses: HashMap::new(),
                fallback,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn respond(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            self.responses.insert(query.to_string(), hits);
            self
        }

        fn recorded_queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for MockBackend {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self
                .responses
                .get(query)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }

    fn track(title: &str, artist: Option<&str>) -> TrackDescriptor {
        TrackDescriptor {
            catalog_id: None,
            title: title.to_string(),
            artists: artist.map(String::from).into_iter().collect(),
            album: None,
            year: None,
            duration_ms: None,
            track_number: None,
            disc_number: None,
            isrc: None,
        }
    }

    async fn resolver(backend: MockBackend) -> (CandidateResolver, Arc<MockBackend>, Database) {
        let backend = Arc::new(backend);
        let db = Database::connect_in_memory().await.unwrap();
        let resolver =
            CandidateResolver::new(backend.clone(), db.clone(), ResolverConfig::default());
        (resolver, backend, db)
    }

    #[test]
    fn test_normalize_artist_key() {
        assert_eq!(normalize_artist_key("ColdplayVEVO"), "coldplay");
        assert_eq!(normalize_artist_key("The Weeknd - Topic"), "theweeknd");
        assert_eq!(normalize_artist_key("Coldplay Official Channel"), "coldplay");
        // Accented characters are dropped along with punctuation
        assert_eq!(normalize_artist_key("Måneskin"), "mneskin");
        assert_eq!(normalize_artist_key("AC/DC"), "acdc");
    }

    #[test]
    fn test_build_queries_with_channel_bias() {
        let queries = build_queries("Yellow", Some("Coldplay"), Some("https://yt/channel/c1"));
        assert_eq!(queries.len(), 6);
        assert_eq!(queries[0], "https://yt/channel/c1 Yellow Coldplay lyrics");
        assert_eq!(queries[3], "Yellow Coldplay lyrics");
        assert_eq!(queries[5], "Yellow Coldplay");
    }

    #[test]
    fn test_build_queries_title_only() {
        let queries = build_queries("Yellow", None, None);
        assert_eq!(queries, vec!["Yellow lyrics".to_string(), "Yellow".to_string()]);
    }

    #[test]
    fn test_score_rejects_banned_phrase() {
        let hit = video("a", "Yellow — Official Music Video", "Coldplay");
        assert_eq!(score_candidate(&hit, "Yellow", Some("Coldplay")), None);
    }

    #[test]
    fn test_score_prefers_lyric_upload() {
        let lyric = video("a", "Coldplay - Yellow (Lyric Video)", "ColdplayVEVO");
        let plain = video("b", "Coldplay - Yellow", "someone");
        let lyric_score = score_candidate(&lyric, "Yellow", Some("Coldplay")).unwrap();
        let plain_score = score_candidate(&plain, "Yellow", Some("Coldplay")).unwrap();
        assert!(lyric_score > plain_score);
    }

    #[test]
    fn test_score_requires_all_title_tokens() {
        let hit = video("a", "Coldplay - Trouble", "ColdplayVEVO");
        assert_eq!(score_candidate(&hit, "Yellow", Some("Coldplay")), None);
    }

    #[tokio::test]
    async fn test_resolve_accepts_lyric_video() {
        let backend = MockBackend::with_fallback(vec![video(
            "abc123",
            "Coldplay - Yellow (Lyric Video)",
            "ColdplayVEVO",
        )]);
        let (resolver, _backend, _db) = resolver(backend).await;

        let matched = resolver
            .resolve(&track("Yellow", Some("Coldplay")))
            .await
            .unwrap();
        assert_eq!(matched.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(matched.remote_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_music_video_only() {
        let backend = MockBackend::with_fallback(vec![video(
            "abc123",
            "Yellow — Official Music Video",
            "Coldplay",
        )]);
        let (resolver, _backend, _db) = resolver(backend).await;

        let result = resolver.resolve(&track("Yellow", Some("Coldplay"))).await;
        assert_matches!(result, Err(PipelineError::NoMatchFound));
    }

    #[tokio::test]
    async fn test_resolve_without_artist_uses_title_queries() {
        let backend = MockBackend::with_fallback(vec![video(
            "xyz",
            "Yellow (Lyric Video)",
            "whoever",
        )]);
        let (resolver, backend, _db) = resolver(backend).await;

        let matched = resolver.resolve(&track("Yellow", None)).await.unwrap();
        assert_eq!(matched.remote_id.as_deref(), Some("xyz"));
        assert!(matched.channel_url.is_none());

        // No channel-discovery query and no artist terms anywhere
        let queries = backend.recorded_queries();
        assert_eq!(queries, vec!["Yellow lyrics".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_absent_title_tokens_never_match() {
        let backend = MockBackend::with_fallback(vec![
            video("a", "Completely Unrelated Song", "Nobody"),
            video("b", "Another Miss", "Nobody"),
        ]);
        let (resolver, backend, _db) = resolver(backend).await;

        let result = resolver.resolve(&track("Yellow", Some("Coldplay"))).await;
        assert_matches!(result, Err(PipelineError::NoMatchFound));

        // Every query in the ladder was exhausted (channel discovery + 3)
        assert_eq!(backend.recorded_queries().len(), 4);
    }

    #[tokio::test]
    async fn test_resolve_discovers_and_caches_channel() {
        let channel_url = "https://www.youtube.com/channel/UCDPM";
        let backend = MockBackend::with_fallback(vec![video(
            "abc123",
            "Coldplay - Yellow (Official Audio)",
            "Coldplay",
        )])
        .respond(
            "Coldplay official channel",
            vec![channel("Coldplay", channel_url)],
        );
        let (resolver, backend, db) = resolver(backend).await;

        let matched = resolver
            .resolve(&track("Yellow", Some("Coldplay")))
            .await
            .unwrap();
        assert_eq!(matched.channel_url.as_deref(), Some(channel_url));

        // Discovery persisted for the next resolution of the same artist
        assert_eq!(
            db.channels().lookup("coldplay").await.unwrap().as_deref(),
            Some(channel_url)
        );

        // Channel-biased queries were tried before unbiased ones
        let queries = backend.recorded_queries();
        assert_eq!(queries[0], "Coldplay official channel");
        assert!(queries[1].starts_with(channel_url));
    }

    #[tokio::test]
    async fn test_resolve_stops_after_first_accepting_query() {
        let backend = MockBackend::with_fallback(vec![video(
            "abc123",
            "Coldplay - Yellow (Lyric Video)",
            "ColdplayVEVO",
        )]);
        let (resolver, backend, _db) = resolver(backend).await;

        resolver
            .resolve(&track("Yellow", Some("Coldplay")))
            .await
            .unwrap();

        // One channel-discovery query plus exactly one candidate query
        assert_eq!(backend.recorded_queries().len(), 2);
    }
}
