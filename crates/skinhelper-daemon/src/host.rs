//! Collaborator contracts.
//!
//! The host runtime, the metadata-enrichment subsystem and the library
//! accessor are external services.  The daemon only depends on these traits;
//! `rpc` provides implementations backed by the host's JSON-RPC socket and
//! the tests provide in-memory ones.

use async_trait::async_trait;
use serde_json::{Map, Value};
use skinhelper_proto::media::{Filter, MediaRecord, MediaType};
use tracing::debug;

/// Attribute mapping returned by the metadata service.
pub type Details = Map<String, Value>;

/// Commands the daemon sends to the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Toggle the player info overlay.
    ToggleInfo,
    /// Close the topmost dialog.
    CloseDialog,
    /// Ask the artwork-downloader add-on to scan one item.
    RunArtworkDownloader { media_type: MediaType, dbid: i64 },
}

/// The host media-center runtime.
#[async_trait]
pub trait Host: Send + Sync {
    /// Read an info label such as `Player.Title`.
    async fn info_label(&self, label: &str) -> anyhow::Result<String>;
    /// Evaluate a boolean condition such as `Player.HasAudio`.
    async fn condition(&self, condition: &str) -> anyhow::Result<bool>;
    async fn execute(&self, command: HostCommand) -> anyhow::Result<()>;
}

/// Descriptive fields used to cross-reference external ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoLookup {
    pub title: String,
    pub media_type: Option<MediaType>,
    pub year: String,
    pub imdb_id: String,
    pub tvshow_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIds {
    pub imdb: String,
    pub tvdb: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataQuery {
    Omdb {
        imdb_id: String,
    },
    StreamDetails {
        dbid: i64,
        media_type: MediaType,
    },
    Top250 {
        imdb_id: String,
    },
    TvdbDetails {
        imdb_id: String,
        tvdb_id: String,
    },
    TmdbDetails {
        imdb_id: String,
    },
    AnimatedArtwork {
        imdb_id: String,
    },
    ExtendedArtwork {
        imdb_id: String,
        tvdb_id: String,
        tmdb_id: String,
        media_type: MediaType,
    },
    MusicArtwork {
        artist: String,
        album: String,
        title: String,
        disc: String,
    },
    PvrArtwork {
        title: String,
        channel: String,
        genre: String,
    },
}

/// The metadata-enrichment subsystem.  A miss is an empty mapping, not an error.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn resolve_ids(&self, lookup: &VideoLookup) -> anyhow::Result<ExternalIds>;
    async fn resolve(&self, query: &MetadataQuery, ignore_cache: bool) -> anyhow::Result<Details>;
    async fn channel_logo(&self, channel: &str) -> anyhow::Result<Option<String>>;
}

#[async_trait]
pub trait LibraryAccessor: Send + Sync {
    async fn query(&self, kind: MediaType, filters: &[Filter]) -> anyhow::Result<Vec<MediaRecord>>;
    async fn get(&self, kind: MediaType, id: i64) -> anyhow::Result<Option<MediaRecord>>;
    /// Per-item display preparation (artwork, labels) before a record is listed.
    async fn prepare(&self, record: MediaRecord) -> MediaRecord {
        record
    }
}

/// Skin settings the monitor consults at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinSetting {
    AnimatedPosters,
    ExtendedArt,
    MusicArt,
    PvrThumbs,
    ArtworkDownloader,
}

impl SkinSetting {
    pub fn condition(&self) -> &'static str {
        match self {
            Self::AnimatedPosters => "Skin.HasSetting(SkinHelper.EnableAnimatedPosters)",
            Self::ExtendedArt => "Skin.HasSetting(SkinHelper.EnableExtendedArt)",
            Self::MusicArt => "Skin.HasSetting(SkinHelper.EnableMusicArt)",
            Self::PvrThumbs => "Skin.HasSetting(SkinHelper.EnablePVRThumbs)",
            Self::ArtworkDownloader => {
                "System.HasAddon(script.artwork.downloader) + Skin.HasSetting(EnableArtworkDownloader)"
            }
        }
    }
}

/// Evaluate a condition, treating host errors as `false`.
pub async fn check(host: &dyn Host, condition: &str) -> bool {
    match host.condition(condition).await {
        Ok(v) => v,
        Err(e) => {
            debug!("host: condition {} failed: {:#}", condition, e);
            false
        }
    }
}

/// Read a label, treating host errors as empty.
pub async fn label(host: &dyn Host, label: &str) -> String {
    match host.info_label(label).await {
        Ok(v) => v,
        Err(e) => {
            debug!("host: label {} failed: {:#}", label, e);
            String::new()
        }
    }
}

pub async fn skin_setting(host: &dyn Host, setting: SkinSetting) -> bool {
    check(host, setting.condition()).await
}

/// Merge `src` into `dst`.  Empty values never overwrite, nested objects merge.
pub fn merge_details(dst: &mut Details, src: Details) {
    for (key, value) in src {
        if is_empty_value(&value) {
            continue;
        }
        match value {
            Value::Object(inner) if matches!(dst.get(&key), Some(Value::Object(_))) => {
                if let Some(Value::Object(existing)) = dst.get_mut(&key) {
                    merge_details(existing, inner);
                }
            }
            value => {
                dst.insert(key, value);
            }
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
