/// JSON-RPC driver for the host media center, with separated reader/writer tasks.
///
/// Architecture:
///
/// ```text
///   connect(address)
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         └── reader_task   ← decodes concatenated JSON objects from socket
///                                ├── response (has id)       → matched oneshot::Sender
///                                └── notification (method)   → HostNotification channel
/// ```
///
/// The host's TCP transport sends objects back to back with no delimiter, so
/// the reader keeps a byte buffer and pulls complete values off its front.
///
/// `RpcHandle` is cheaply cloneable.  `RpcHost`, `RpcLibrary` and
/// `LibraryMetadata` wrap it to implement the collaborator traits.
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use skinhelper_proto::media::{Filter, HostNotification, MediaRecord, MediaType};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::host::{
    Details, ExternalIds, Host, HostCommand, LibraryAccessor, MetadataQuery, MetadataService,
    VideoLookup,
};

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("host connection closed")]
    Closed,
    #[error("host did not answer {method} (id={id}) in time")]
    Timeout { method: String, id: u64 },
    #[error("host error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

type ReplySender = oneshot::Sender<Result<Value, RpcError>>;
type PendingMap = Arc<Mutex<HashMap<u64, ReplySender>>>;

struct PendingRequest {
    req_id: u64,
    payload: Vec<u8>,
    reply: ReplySender,
}

// ── public handle ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RpcHandle {
    tx: mpsc::Sender<PendingRequest>,
    timeout: Duration,
}

impl RpcHandle {
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "jsonrpc": "2.0", "id": req_id, "method": method, "params": params });
        let payload = serde_json::to_vec(&msg)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RpcError::Closed)?;

        tokio::time::timeout(self.timeout, reply_rx)
            .await
            .map_err(|_| RpcError::Timeout {
                method: method.to_string(),
                id: req_id,
            })?
            .map_err(|_| RpcError::Closed)?
    }
}

/// Connect to the host and start the io tasks.  Notifications are forwarded
/// to `notify_tx`; when the connection drops the sender is released, which
/// closes the receiving side.
pub async fn connect(
    address: &str,
    timeout: Duration,
    notify_tx: mpsc::Sender<HostNotification>,
) -> Result<RpcHandle, RpcError> {
    let stream = TcpStream::connect(address).await?;
    info!("rpc: connected to host at {}", address);
    let (read_half, write_half) = stream.into_split();
    Ok(start_io_tasks(read_half, write_half, timeout, notify_tx))
}

pub fn start_io_tasks<R, W>(
    reader: R,
    writer: W,
    timeout: Duration,
    notify_tx: mpsc::Sender<HostNotification>,
) -> RpcHandle
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, notify_tx));

    RpcHandle {
        tx: cmd_tx,
        timeout,
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: R,
    pending: PendingMap,
    notify_tx: mpsc::Sender<HostNotification>,
) where
    R: AsyncRead + Unpin,
{
    let mut tmp = [0u8; 8192];
    let mut buf: Vec<u8> = Vec::new();

    loop {
        match reader.read(&mut tmp).await {
            Ok(0) => {
                debug!("rpc reader: connection closed");
                break;
            }
            Ok(n) => {
                buf.extend_from_slice(&tmp[..n]);
                let (values, consumed) = split_values(&buf);
                buf.drain(..consumed);
                for v in values {
                    route(v, &pending, &notify_tx).await;
                }
            }
            Err(e) => {
                warn!("rpc reader: read error: {}", e);
                break;
            }
        }
    }

    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(RpcError::Closed));
    }
}

/// Pull every complete JSON value off the front of `buf`.  Returns the values
/// and how many bytes they used; a trailing partial value is left in place.
/// Undecodable bytes are skipped up to the next `{`.
fn split_values(buf: &[u8]) -> (Vec<Value>, usize) {
    let mut values = Vec::new();
    let mut consumed = 0;
    'resync: loop {
        let start = consumed;
        let mut stream = serde_json::Deserializer::from_slice(&buf[start..]).into_iter::<Value>();
        loop {
            match stream.next() {
                Some(Ok(v)) => {
                    values.push(v);
                    consumed = start + stream.byte_offset();
                }
                Some(Err(e)) if e.is_eof() => break 'resync,
                Some(Err(e)) => {
                    let bad = start + stream.byte_offset();
                    warn!("rpc reader: skipping undecodable input: {}", e);
                    match buf[bad + 1..].iter().position(|&b| b == b'{') {
                        Some(pos) => {
                            consumed = bad + 1 + pos;
                            continue 'resync;
                        }
                        None => return (values, buf.len()),
                    }
                }
                None => break 'resync,
            }
        }
    }
    (values, consumed)
}

async fn route(
    value: Value,
    pending: &PendingMap,
    notify_tx: &mpsc::Sender<HostNotification>,
) {
    if let Some(req_id) = value.get("id").and_then(Value::as_u64) {
        let Some(tx) = pending.lock().await.remove(&req_id) else {
            debug!("rpc reader: response for unknown id={}", req_id);
            return;
        };
        let result = match value.get("error") {
            Some(err) => Err(RpcError::Remote {
                code: err["code"].as_i64().unwrap_or(0),
                message: err["message"].as_str().unwrap_or("unknown error").to_string(),
            }),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
        return;
    }

    let Some(method) = value.get("method").and_then(Value::as_str) else {
        debug!("rpc reader: ignoring {}", value);
        return;
    };
    let params = &value["params"];
    let notification = HostNotification {
        sender: params["sender"].as_str().unwrap_or("xbmc").to_string(),
        method: method.to_string(),
        data: params.get("data").unwrap_or(&Value::Null).to_string(),
    };
    // Replies must keep flowing while the monitor is busy, so a full channel
    // drops the notification instead of stalling the reader.
    match notify_tx.try_send(notification) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(n)) => {
            debug!("rpc reader: notification queue full, dropping {}", n.method);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("rpc reader: notification receiver gone");
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(&req.payload).await {
            warn!("rpc writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(RpcError::Io(e)));
            }
            break;
        }
    }
    debug!("rpc writer: task exiting");
}

// ── Host ──────────────────────────────────────────────────────────────────────

pub struct RpcHost {
    rpc: RpcHandle,
}

impl RpcHost {
    pub fn new(rpc: RpcHandle) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Host for RpcHost {
    async fn info_label(&self, label: &str) -> anyhow::Result<String> {
        let result = self
            .rpc
            .call("XBMC.GetInfoLabels", json!({ "labels": [label] }))
            .await?;
        Ok(result[label].as_str().unwrap_or_default().to_string())
    }

    async fn condition(&self, condition: &str) -> anyhow::Result<bool> {
        let result = self
            .rpc
            .call("XBMC.GetInfoBooleans", json!({ "booleans": [condition] }))
            .await?;
        Ok(result[condition].as_bool().unwrap_or(false))
    }

    async fn execute(&self, command: HostCommand) -> anyhow::Result<()> {
        let (method, params) = match command {
            HostCommand::ToggleInfo => ("Input.ExecuteAction", json!({ "action": "info" })),
            HostCommand::CloseDialog => ("Input.ExecuteAction", json!({ "action": "close" })),
            HostCommand::RunArtworkDownloader { media_type, dbid } => (
                "Addons.ExecuteAddon",
                json!({
                    "addonid": "script.artwork.downloader",
                    "params": [
                        "silent=true",
                        format!("mediatype={}", media_type),
                        format!("dbid={}", dbid),
                    ],
                }),
            ),
        };
        self.rpc.call(method, params).await?;
        Ok(())
    }
}

// ── LibraryAccessor ───────────────────────────────────────────────────────────

/// JSON-RPC names for one library kind.
struct LibraryMethods {
    list: &'static str,
    list_key: &'static str,
    details: &'static str,
    details_key: &'static str,
    id_key: &'static str,
    properties: &'static [&'static str],
}

fn library_methods(kind: MediaType) -> LibraryMethods {
    match kind {
        MediaType::Movie => LibraryMethods {
            list: "VideoLibrary.GetMovies",
            list_key: "movies",
            details: "VideoLibrary.GetMovieDetails",
            details_key: "moviedetails",
            id_key: "movieid",
            properties: &["title", "year", "imdbnumber", "uniqueid", "file", "art"],
        },
        MediaType::TvShow => LibraryMethods {
            list: "VideoLibrary.GetTVShows",
            list_key: "tvshows",
            details: "VideoLibrary.GetTVShowDetails",
            details_key: "tvshowdetails",
            id_key: "tvshowid",
            properties: &["title", "year", "imdbnumber", "uniqueid", "file", "art"],
        },
        MediaType::Episode => LibraryMethods {
            list: "VideoLibrary.GetEpisodes",
            list_key: "episodes",
            details: "VideoLibrary.GetEpisodeDetails",
            details_key: "episodedetails",
            id_key: "episodeid",
            properties: &["title", "tvshowid", "uniqueid", "file", "art"],
        },
        MediaType::MusicVideo => LibraryMethods {
            list: "VideoLibrary.GetMusicVideos",
            list_key: "musicvideos",
            details: "VideoLibrary.GetMusicVideoDetails",
            details_key: "musicvideodetails",
            id_key: "musicvideoid",
            properties: &["title", "year", "artist", "album", "file", "art"],
        },
        MediaType::Song => LibraryMethods {
            list: "AudioLibrary.GetSongs",
            list_key: "songs",
            details: "AudioLibrary.GetSongDetails",
            details_key: "songdetails",
            id_key: "songid",
            properties: &["title", "artist", "album", "disc", "year", "file", "art"],
        },
        MediaType::Album => LibraryMethods {
            list: "AudioLibrary.GetAlbums",
            list_key: "albums",
            details: "AudioLibrary.GetAlbumDetails",
            details_key: "albumdetails",
            id_key: "albumid",
            properties: &["title", "artist", "year", "art"],
        },
        MediaType::Artist => LibraryMethods {
            list: "AudioLibrary.GetArtists",
            list_key: "artists",
            details: "AudioLibrary.GetArtistDetails",
            details_key: "artistdetails",
            id_key: "artistid",
            properties: &["art"],
        },
    }
}

fn filter_json(filters: &[Filter]) -> Option<Value> {
    let rules: Vec<Value> = filters
        .iter()
        .map(|f| json!({ "field": f.field, "operator": f.operator, "value": f.value }))
        .collect();
    match rules.len() {
        0 => None,
        1 => rules.into_iter().next(),
        _ => Some(json!({ "and": rules })),
    }
}

/// Build a record from a library JSON object.  Objects without a numeric id
/// are skipped.
pub fn record_from_json(kind: MediaType, id_key: &str, v: &Value) -> Option<MediaRecord> {
    let id = v.get(id_key)?.as_i64()?;
    let title = ["title", "label", "artist"]
        .iter()
        .filter_map(|k| v[*k].as_str())
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    let mut record = MediaRecord::new(id, kind, title);
    record.year = v["year"]
        .as_i64()
        .and_then(|y| i32::try_from(y).ok())
        .filter(|y| *y > 0);
    record.imdbnumber = v["imdbnumber"].as_str().unwrap_or_default().to_string();
    record.uniqueid = string_map(&v["uniqueid"]);
    record.artist = match &v["artist"] {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };
    record.album = v["album"].as_str().unwrap_or_default().to_string();
    record.disc = v["disc"].as_u64().and_then(|d| u32::try_from(d).ok());
    record.tvshowid = v["tvshowid"].as_i64().filter(|id| *id > 0);
    record.file = v["file"].as_str().unwrap_or_default().to_string();
    record.art = string_map(&v["art"]);
    Some(record)
}

fn string_map(v: &Value) -> BTreeMap<String, String> {
    v.as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub struct RpcLibrary {
    rpc: RpcHandle,
}

impl RpcLibrary {
    pub fn new(rpc: RpcHandle) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl LibraryAccessor for RpcLibrary {
    async fn query(&self, kind: MediaType, filters: &[Filter]) -> anyhow::Result<Vec<MediaRecord>> {
        let m = library_methods(kind);
        let mut params = json!({ "properties": m.properties });
        if let Some(filter) = filter_json(filters) {
            params["filter"] = filter;
        }
        let result = self.rpc.call(m.list, params).await?;
        let records = result[m.list_key]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| record_from_json(kind, m.id_key, v))
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn get(&self, kind: MediaType, id: i64) -> anyhow::Result<Option<MediaRecord>> {
        let m = library_methods(kind);
        let params = json!({ m.id_key: id, "properties": m.properties });
        match self.rpc.call(m.details, params).await {
            Ok(result) => Ok(record_from_json(kind, m.id_key, &result[m.details_key])),
            // the host answers an unknown id with "Invalid params"
            Err(RpcError::Remote { code: -32602, .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ── MetadataService ───────────────────────────────────────────────────────────

/// Metadata answered from the host library alone.  Only stream details are
/// available locally; every online lookup is a miss.
pub struct LibraryMetadata {
    rpc: RpcHandle,
}

impl LibraryMetadata {
    pub fn new(rpc: RpcHandle) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl MetadataService for LibraryMetadata {
    async fn resolve_ids(&self, lookup: &VideoLookup) -> anyhow::Result<ExternalIds> {
        Ok(ExternalIds {
            imdb: lookup.imdb_id.clone(),
            tvdb: String::new(),
        })
    }

    async fn resolve(&self, query: &MetadataQuery, _ignore_cache: bool) -> anyhow::Result<Details> {
        let MetadataQuery::StreamDetails { dbid, media_type } = query else {
            return Ok(Details::new());
        };
        if !media_type.is_video() {
            return Ok(Details::new());
        }
        let m = library_methods(*media_type);
        let params = json!({ m.id_key: dbid, "properties": ["streamdetails"] });
        let result = self.rpc.call(m.details, params).await?;
        Ok(stream_details(&result[m.details_key]["streamdetails"]))
    }

    async fn channel_logo(&self, _channel: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Summarise a library `streamdetails` object into flat display attributes.
pub fn stream_details(sd: &Value) -> Details {
    let mut details = Map::new();

    if let Some(video) = sd["video"].as_array().and_then(|v| v.first()) {
        let width = video["width"].as_u64().unwrap_or(0);
        let height = video["height"].as_u64().unwrap_or(0);
        if width > 0 && height > 0 {
            details.insert(
                "videoresolution".to_string(),
                Value::String(resolution_label(width, height).to_string()),
            );
        }
        if let Some(codec) = video["codec"].as_str() {
            details.insert("videocodec".to_string(), Value::String(codec.to_string()));
        }
        if let Some(aspect) = video["aspect"].as_f64().filter(|a| *a > 0.0) {
            details.insert(
                "videoaspect".to_string(),
                Value::String(format!("{:.2}", aspect)),
            );
        }
        if let Some(mode) = video["stereomode"].as_str().filter(|m| !m.is_empty()) {
            details.insert("3dformat".to_string(), Value::String(mode.to_string()));
        }
    }

    if let Some(audio) = sd["audio"].as_array() {
        if let Some(first) = audio.first() {
            if let Some(codec) = first["codec"].as_str() {
                details.insert("audiocodec".to_string(), Value::String(codec.to_string()));
            }
            if let Some(channels) = first["channels"].as_u64() {
                details.insert(
                    "audiochannels".to_string(),
                    Value::String(channels.to_string()),
                );
            }
        }
        details.insert("audiolanguage".to_string(), languages(audio));
    }

    if let Some(subtitles) = sd["subtitle"].as_array() {
        details.insert("subtitlelanguage".to_string(), languages(subtitles));
    }

    details
}

fn resolution_label(width: u64, height: u64) -> &'static str {
    match (width, height) {
        (w, h) if w <= 720 && h <= 480 => "480",
        (w, h) if w <= 768 && h <= 576 => "576",
        (w, h) if w <= 960 && h <= 544 => "540",
        (w, h) if w <= 1280 && h <= 720 => "720",
        (w, h) if w <= 1920 && h <= 1080 => "1080",
        _ => "4k",
    }
}

fn languages(streams: &[Value]) -> Value {
    let mut langs: Vec<Value> = Vec::new();
    for lang in streams.iter().filter_map(|s| s["language"].as_str()) {
        let lang = Value::String(lang.to_string());
        if !lang.as_str().unwrap_or_default().is_empty() && !langs.contains(&lang) {
            langs.push(lang);
        }
    }
    Value::Array(langs)
}
