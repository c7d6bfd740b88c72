//! Media records and host notification classification.
//!
//! The host delivers notifications as `(sender, method, data)` where `data`
//! is a JSON document.  Payloads either carry an `item: {type, id}` object or
//! flat `type`/`id` fields, plus an optional `transaction` flag marking a
//! single-item change (as opposed to a bulk scan).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed notification payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("notification item is not an object: {0}")]
    Item(String),
}

/// Library entity kinds the core knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    TvShow,
    Episode,
    MusicVideo,
    Song,
    Album,
    Artist,
}

impl MediaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tvshow" => Some(Self::TvShow),
            "episode" => Some(Self::Episode),
            "musicvideo" => Some(Self::MusicVideo),
            "song" => Some(Self::Song),
            "album" => Some(Self::Album),
            "artist" => Some(Self::Artist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::TvShow => "tvshow",
            Self::Episode => "episode",
            Self::MusicVideo => "musicvideo",
            Self::Song => "song",
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }

    pub fn is_music(&self) -> bool {
        matches!(self, Self::Song | Self::Album | Self::Artist)
    }

    /// Kinds that carry video stream details.
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Movie | Self::Episode | Self::MusicVideo)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized library record.  Only the fields the core reads are modelled;
/// everything else the accessor returns is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub imdbnumber: String,
    /// Provider name → id, e.g. `imdb → tt0111161`.
    #[serde(default)]
    pub uniqueid: BTreeMap<String, String>,
    #[serde(default)]
    pub artist: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub disc: Option<u32>,
    #[serde(default)]
    pub tvshowid: Option<i64>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub art: BTreeMap<String, String>,
}

impl MediaRecord {
    pub fn new(id: i64, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            id,
            media_type,
            title: title.into(),
            year: None,
            imdbnumber: String::new(),
            uniqueid: BTreeMap::new(),
            artist: Vec::new(),
            album: String::new(),
            disc: None,
            tvshowid: None,
            file: String::new(),
            is_folder: false,
            art: BTreeMap::new(),
        }
    }

    /// IMDb id from `imdbnumber`, falling back to any `tt…` unique id.
    pub fn imdb_id(&self) -> Option<&str> {
        if !self.imdbnumber.is_empty() {
            return Some(&self.imdbnumber);
        }
        self.uniqueid
            .values()
            .map(String::as_str)
            .find(|v| v.starts_with("tt"))
    }

    pub fn first_artist(&self) -> &str {
        self.artist.first().map(String::as_str).unwrap_or("")
    }
}

/// A single library filter rule, e.g. `title contains "abc"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl Filter {
    pub fn title_contains(value: impl Into<String>) -> Self {
        Self {
            field: "title".to_string(),
            operator: "contains".to_string(),
            value: value.into(),
        }
    }
}

/// Display item of a search result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: i64,
    pub media_type: MediaType,
    pub label: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub art: BTreeMap<String, String>,
}

impl From<MediaRecord> for SearchItem {
    fn from(record: MediaRecord) -> Self {
        Self {
            id: record.id,
            media_type: record.media_type,
            label: record.title,
            year: record.year,
            file: record.file,
            is_folder: record.is_folder,
            art: record.art,
        }
    }
}

/// The three result lists of one search, tagged with the query that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub movies: Vec<SearchItem>,
    pub tvshows: Vec<SearchItem>,
    pub episodes: Vec<SearchItem>,
}

impl SearchResults {
    pub fn reset(&mut self, query: &str) {
        self.query = query.to_string();
        self.movies.clear();
        self.tvshows.clear();
        self.episodes.clear();
    }

    pub fn list_mut(&mut self, kind: MediaType) -> Option<&mut Vec<SearchItem>> {
        match kind {
            MediaType::Movie => Some(&mut self.movies),
            MediaType::TvShow => Some(&mut self.tvshows),
            MediaType::Episode => Some(&mut self.episodes),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.tvshows.is_empty() && self.episodes.is_empty()
    }
}

/// One raw notification as delivered by the host.
#[derive(Debug, Clone)]
pub struct HostNotification {
    pub sender: String,
    pub method: String,
    /// JSON-encoded payload.
    pub data: String,
}

impl HostNotification {
    pub fn new(method: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            sender: "xbmc".to_string(),
            method: method.into(),
            data: data.into(),
        }
    }
}

/// Notification methods the monitor reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Quit,
    VideoLibraryUpdated,
    AudioLibraryUpdated,
    PlaybackStopped,
    PlaybackStarted,
    Other(String),
}

impl NotificationKind {
    pub fn classify(method: &str) -> Self {
        match method {
            "System.OnQuit" => Self::Quit,
            "VideoLibrary.OnUpdate" => Self::VideoLibraryUpdated,
            "AudioLibrary.OnUpdate" => Self::AudioLibraryUpdated,
            "Player.OnStop" => Self::PlaybackStopped,
            "Player.OnPlay" => Self::PlaybackStarted,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The item a notification refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRef {
    /// Raw media type string; may name kinds the core has no handler for.
    pub media_type: String,
    pub dbid: i64,
    pub transaction: bool,
}

impl ItemRef {
    pub fn from_payload(data: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(data)?;
        let mut item = ItemRef::default();
        let Some(obj) = value.as_object() else {
            return Ok(item);
        };

        if let Some(inner) = obj.get("item").filter(|v| is_truthy(v)) {
            let inner = inner
                .as_object()
                .ok_or_else(|| ProtocolError::Item(inner.to_string()))?;
            item.media_type = str_field(inner.get("type"));
            item.dbid = id_field(inner.get("id"));
        } else if obj.get("type").map(is_truthy).unwrap_or(false) {
            item.media_type = str_field(obj.get("type"));
            item.dbid = id_field(obj.get("id"));
        }

        item.transaction = obj.get("transaction").map(is_truthy).unwrap_or(false);
        Ok(item)
    }

    pub fn kind(&self) -> Option<MediaType> {
        MediaType::parse(&self.media_type)
    }

    pub fn has_dbid(&self) -> bool {
        self.dbid != 0
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn str_field(v: Option<&Value>) -> String {
    v.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn id_field(v: Option<&Value>) -> i64 {
    match v {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
