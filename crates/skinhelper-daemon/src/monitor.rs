/// PlaybackMonitor: the single subscriber to the host notification stream.
///
/// Every notification is classified into a `NotificationKind` and routed to
/// one handler.  Handlers never propagate errors out of `on_notification`;
/// a bad payload or a failing collaborator is logged and the loop carries on.
///
/// Library updates fan out into background tasks bounded by a semaphore.
/// When every permit is taken the update is dropped rather than queued, so a
/// bulk library scan cannot pile up enrichment work.
///
/// Radio streams and live TV change content without notifying, so playback
/// of those starts a poll-and-diff watcher (see `watch`).  At most one
/// watcher runs at a time and it is cancelled on `Player.OnStop`.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use skinhelper_proto::config::MonitorConfig;
use skinhelper_proto::media::{
    HostNotification, ItemRef, MediaRecord, MediaType, NotificationKind,
};
use skinhelper_proto::properties::{flatten, PropertyStore, SessionProperties};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::host::{
    check, label, merge_details, skin_setting, Details, Host, HostCommand, LibraryAccessor,
    MetadataQuery, MetadataService, SkinSetting, VideoLookup,
};
use crate::watch::{poll_and_diff, PollTarget};

pub const SHUTDOWN_REQUESTED_PROP: &str = "SkinHelperShutdownRequested";
const PLAYER_PLAYING_PROP: &str = "Skinhelper.PlayerPlaying";
const TRAILER_PLAYING_PROP: &str = "TrailerPlaying";
const SCREENSAVER_PROP: &str = "VideoScreensaverRunning";
const INFO_PANEL_SECONDS_LABEL: &str = "Skin.String(SkinHelper.ShowInfoAtPlaybackStart)";
const INFO_PANEL_ATTEMPTS: u32 = 50;
const INFO_PANEL_POLL: Duration = Duration::from_millis(100);

/// Separators tried, in order, when an internet stream reports "Artist - Title"
/// as a single title.
const STREAM_TITLE_SEPARATORS: [&str; 4] = [" - ", "-", ":", ";"];

pub struct PlaybackMonitor {
    shared: Arc<Shared>,
}

struct Shared {
    host: Arc<dyn Host>,
    metadata: Arc<dyn MetadataService>,
    library: Arc<dyn LibraryAccessor>,
    props: SessionProperties,
    config: MonitorConfig,
    /// Process-wide abort signal.
    abort: CancellationToken,
    /// Child of `abort`, cancelled and replaced on every stop.
    session: Mutex<CancellationToken>,
    refresh_gate: Arc<Semaphore>,
    dropped_updates: AtomicU64,
    video_widgets_busy: AtomicBool,
    music_widgets_busy: AtomicBool,
    monitoring_stream: AtomicBool,
    info_panel_shown: AtomicBool,
}

impl PlaybackMonitor {
    pub fn new(
        host: Arc<dyn Host>,
        metadata: Arc<dyn MetadataService>,
        library: Arc<dyn LibraryAccessor>,
        store: Arc<PropertyStore>,
        mut config: MonitorConfig,
        abort: CancellationToken,
    ) -> Self {
        let max_tasks = config.max_refresh_tasks.clamp(1, Semaphore::MAX_PERMITS);
        if max_tasks != config.max_refresh_tasks {
            warn!(
                "monitor: max_refresh_tasks {} out of range, using {}",
                config.max_refresh_tasks, max_tasks
            );
            config.max_refresh_tasks = max_tasks;
        }
        let refresh_gate = Arc::new(Semaphore::new(max_tasks));
        let session = Mutex::new(abort.child_token());
        Self {
            shared: Arc::new(Shared {
                host,
                metadata,
                library,
                props: SessionProperties::new(store),
                config,
                abort,
                session,
                refresh_gate,
                dropped_updates: AtomicU64::new(0),
                video_widgets_busy: AtomicBool::new(false),
                music_widgets_busy: AtomicBool::new(false),
                monitoring_stream: AtomicBool::new(false),
                info_panel_shown: AtomicBool::new(false),
            }),
        }
    }

    /// Run the notification loop.  Returns when the channel closes or the
    /// abort token fires.
    pub async fn run(self, mut rx: mpsc::Receiver<HostNotification>) {
        info!("monitor: starting notification loop");
        loop {
            let notification = tokio::select! {
                _ = self.shared.abort.cancelled() => {
                    info!("monitor: abort requested");
                    break;
                }
                n = rx.recv() => match n {
                    Some(n) => n,
                    None => {
                        info!("monitor: notification channel closed");
                        break;
                    }
                },
            };
            self.on_notification(notification).await;
        }
        self.shared.end_session();
    }

    /// Handle one notification.  Never fails.
    pub async fn on_notification(&self, notification: HostNotification) {
        debug!(
            "monitor: sender {} - method: {} - data: {}",
            notification.sender, notification.method, notification.data
        );
        if let Err(e) = self.dispatch(&notification).await {
            error!("monitor: {} handler failed: {:#}", notification.method, e);
        }
    }

    async fn dispatch(&self, notification: &HostNotification) -> anyhow::Result<()> {
        let item = ItemRef::from_payload(&notification.data)?;
        let shared = &self.shared;
        match NotificationKind::classify(&notification.method) {
            NotificationKind::Quit => {
                shared
                    .props
                    .store()
                    .set(SHUTDOWN_REQUESTED_PROP, "shutdown")
                    .await;
            }
            NotificationKind::VideoLibraryUpdated | NotificationKind::AudioLibraryUpdated => {
                shared.library_updated(item);
            }
            NotificationKind::PlaybackStopped => shared.playback_stopped(item).await,
            NotificationKind::PlaybackStarted => shared.playback_started(item).await,
            NotificationKind::Other(_) => {}
        }
        Ok(())
    }

    pub fn properties(&self) -> &Arc<PropertyStore> {
        self.shared.props.store()
    }

    /// Keys written for the current playback session.
    pub async fn session_keys(&self) -> Vec<String> {
        self.shared.props.keys().await
    }

    pub fn is_watching(&self) -> bool {
        self.shared.monitoring_stream.load(Ordering::Acquire)
    }

    pub fn refresh_tasks_in_flight(&self) -> usize {
        self.shared.config.max_refresh_tasks - self.shared.refresh_gate.available_permits()
    }

    pub fn dropped_updates(&self) -> u64 {
        self.shared.dropped_updates.load(Ordering::Relaxed)
    }
}

impl Shared {
    // ── session ───────────────────────────────────────────────────────────────

    fn session_token(&self) -> CancellationToken {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn end_session(&self) {
        {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            session.cancel();
            *session = self.abort.child_token();
        }
        self.monitoring_stream.store(false, Ordering::Release);
        self.info_panel_shown.store(false, Ordering::Release);
    }

    /// Sleep unless `token` fires first.  Returns false when interrupted.
    async fn pause(token: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn lookup(&self, query: MetadataQuery, ignore_cache: bool) -> Details {
        match self.metadata.resolve(&query, ignore_cache).await {
            Ok(details) => details,
            Err(e) => {
                debug!("metadata: {:?} failed: {:#}", query, e);
                Details::new()
            }
        }
    }

    async fn record(&self, kind: MediaType, dbid: i64) -> Option<MediaRecord> {
        match self.library.get(kind, dbid).await {
            Ok(record) => record,
            Err(e) => {
                debug!("library: {} {} failed: {:#}", kind, dbid, e);
                None
            }
        }
    }

    fn prop_key(&self, name: &str) -> String {
        format!("{}{}", self.config.property_prefix, name)
    }

    // ── library updates ───────────────────────────────────────────────────────

    /// Returns whether the update was accepted.
    fn library_updated(self: &Arc<Self>, item: ItemRef) -> bool {
        let permit = match Arc::clone(&self.refresh_gate).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let dropped = self.dropped_updates.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "monitor: {} refresh tasks busy, dropping update for {:?} ({} dropped)",
                    self.config.max_refresh_tasks, item, dropped
                );
                return false;
            }
        };

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = shared.process_db_update(&item).await {
                warn!("monitor: library update for {:?} failed: {:#}", item, e);
            }
            drop(permit);
        });
        true
    }

    async fn process_db_update(&self, item: &ItemRef) -> anyhow::Result<()> {
        let kind = item.kind();
        if kind.map(|k| k.is_music()).unwrap_or(false) {
            self.refresh_music_widgets(&item.media_type).await;
        } else {
            self.refresh_video_widgets(&item.media_type).await;
        }

        if !item.transaction || !item.has_dbid() {
            return Ok(());
        }
        let Some(kind) = kind else {
            return Ok(());
        };
        let dbid = item.dbid;

        match kind {
            MediaType::Movie | MediaType::Episode | MediaType::MusicVideo => {
                if kind == MediaType::Movie
                    && skin_setting(self.host.as_ref(), SkinSetting::AnimatedPosters).await
                {
                    if let Some(movie) = self.record(MediaType::Movie, dbid).await {
                        if let Some(imdb_id) = movie.imdb_id() {
                            let query = MetadataQuery::AnimatedArtwork {
                                imdb_id: imdb_id.to_string(),
                            };
                            self.lookup(query, false).await;
                        }
                    }
                }
                let query = MetadataQuery::StreamDetails {
                    dbid,
                    media_type: kind,
                };
                self.lookup(query, true).await;
                self.artwork_downloader(kind, dbid).await?;
            }
            MediaType::Song => {
                if let Some(song) = self.record(MediaType::Song, dbid).await {
                    let query = MetadataQuery::MusicArtwork {
                        artist: song.first_artist().to_string(),
                        album: song.album.clone(),
                        title: song.title.clone(),
                        disc: song.disc.map(|d| d.to_string()).unwrap_or_default(),
                    };
                    self.lookup(query, true).await;
                }
            }
            MediaType::Album => {
                if let Some(album) = self.record(MediaType::Album, dbid).await {
                    let query = MetadataQuery::MusicArtwork {
                        artist: album.first_artist().to_string(),
                        album: album.title.clone(),
                        title: String::new(),
                        disc: String::new(),
                    };
                    self.lookup(query, true).await;
                }
            }
            MediaType::Artist => {
                if let Some(artist) = self.record(MediaType::Artist, dbid).await {
                    let query = MetadataQuery::MusicArtwork {
                        artist: artist.title.clone(),
                        album: String::new(),
                        title: String::new(),
                        disc: String::new(),
                    };
                    self.lookup(query, true).await;
                }
            }
            MediaType::TvShow => {}
        }
        Ok(())
    }

    async fn artwork_downloader(&self, kind: MediaType, dbid: i64) -> anyhow::Result<()> {
        if !skin_setting(self.host.as_ref(), SkinSetting::ArtworkDownloader).await {
            return Ok(());
        }
        let (media_type, dbid) = if kind == MediaType::Episode {
            match self.record(MediaType::Episode, dbid).await {
                Some(episode) => match episode.tvshowid {
                    Some(show) => (MediaType::TvShow, show),
                    None => return Ok(()),
                },
                None => return Ok(()),
            }
        } else {
            (kind, dbid)
        };
        self.host
            .execute(HostCommand::RunArtworkDownloader { media_type, dbid })
            .await
    }

    async fn refresh_music_widgets(&self, media_type: &str) {
        if self
            .music_widgets_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!(
            "Music database changed - type: {} - refreshing widgets",
            media_type
        );
        if Self::pause(&self.abort, self.config.widget_settle()).await {
            let stamp = widget_timestamp();
            let store = self.props.store();
            store.set("widgetreload-music", &stamp).await;
            store.set("widgetreloadmusic", &stamp).await;
            if !media_type.is_empty() {
                store
                    .set(&format!("widgetreload-{}s", media_type), &stamp)
                    .await;
            }
        }
        self.music_widgets_busy.store(false, Ordering::Release);
    }

    async fn refresh_video_widgets(&self, media_type: &str) {
        if self
            .video_widgets_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!(
            "Video database changed - type: {} - refreshing widgets",
            media_type
        );
        if Self::pause(&self.abort, self.config.widget_settle()).await {
            let stamp = widget_timestamp();
            let store = self.props.store();
            store.set("widgetreload", &stamp).await;
            if !media_type.is_empty() {
                store
                    .set(&format!("widgetreload-{}s", media_type), &stamp)
                    .await;
                if media_type.contains("episode") {
                    store.set("widgetreload-tvshows", &stamp).await;
                }
            }
        }
        self.video_widgets_busy.store(false, Ordering::Release);
    }

    // ── playback ──────────────────────────────────────────────────────────────

    async fn playback_stopped(self: &Arc<Self>, item: ItemRef) {
        self.end_session();
        let store = self.props.store();
        store.clear(PLAYER_PLAYING_PROP).await;
        store.clear(TRAILER_PLAYING_PROP).await;
        self.props.reset().await;
        self.library_updated(item);
    }

    async fn playback_started(self: &Arc<Self>, item: ItemRef) {
        if !self.monitoring_stream.load(Ordering::Acquire) {
            self.props.reset().await;
        }
        if !self.wait_for_player().await {
            debug!("monitor: player never reported audio or video, giving up");
            return;
        }

        let host = self.host.as_ref();
        if check(host, "Player.HasAudio").await {
            if check(host, "Player.IsInternetStream").await {
                self.start_watcher(Arc::new(RadioTarget {
                    shared: Arc::clone(self),
                }));
            } else {
                self.set_music_properties().await;
            }
        } else if check(host, "VideoPlayer.Content(livetv)").await {
            self.start_watcher(Arc::new(LiveTvTarget {
                shared: Arc::clone(self),
            }));
        } else {
            let media = if item.media_type.is_empty() {
                self.detect_media_type().await
            } else {
                item.kind()
            };
            self.set_video_properties(media, item.dbid).await;
            let shared = Arc::clone(self);
            tokio::spawn(async move { shared.show_info_panel().await });
        }
    }

    /// Wait until the player actually reports content.
    async fn wait_for_player(&self) -> bool {
        let host = self.host.as_ref();
        let mut count = 0;
        while !check(host, "Player.HasVideo | Player.HasAudio").await {
            if !Self::pause(&self.abort, self.config.player_wait_interval()).await {
                return false;
            }
            if count == self.config.player_wait_attempts {
                return false;
            }
            count += 1;
        }
        true
    }

    async fn detect_media_type(&self) -> Option<MediaType> {
        let host = self.host.as_ref();
        if check(host, "VideoPlayer.Content(movies)").await {
            Some(MediaType::Movie)
        } else if check(
            host,
            "VideoPlayer.Content(episodes) | !IsEmpty(VideoPlayer.TvShowTitle)",
        )
        .await
        {
            Some(MediaType::Episode)
        } else if check(
            host,
            "VideoPlayer.Content(musicvideos) | !IsEmpty(VideoPlayer.Artist)",
        )
        .await
        {
            Some(MediaType::MusicVideo)
        } else {
            None
        }
    }

    fn start_watcher(self: &Arc<Self>, target: Arc<dyn PollTarget>) {
        if self
            .monitoring_stream
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{}: another watcher is already running", target.name());
            return;
        }
        let token = self.session_token();
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            info!("{}: watcher started", target.name());
            let changes =
                poll_and_diff(target.as_ref(), shared.config.watcher_interval(), &token).await;
            info!("{}: watcher ended after {} changes", target.name(), changes);
            // A cancelled token means end_session already reset the flag and a
            // new watcher may own it by now.
            if !token.is_cancelled() {
                shared.monitoring_stream.store(false, Ordering::Release);
            }
        });
    }

    async fn set_video_properties(&self, media: Option<MediaType>, dbid: i64) {
        let host = self.host.as_ref();
        let title = label(host, "VideoPlayer.Title").await;
        let year = label(host, "VideoPlayer.Year").await;
        let imdb = label(host, "VideoPlayer.IMDBNumber").await;
        let tvshow_title = label(host, "VideoPlayer.TVShowTitle").await;

        let mut details = Details::new();
        details.insert("art".to_string(), Value::Object(Map::new()));

        if let Some(kind) = media.filter(MediaType::is_video) {
            let lookup = VideoLookup {
                title: title.clone(),
                media_type: Some(kind),
                year,
                imdb_id: imdb.clone(),
                tvshow_title,
            };
            let ids = match self.metadata.resolve_ids(&lookup).await {
                Ok(ids) => ids,
                Err(e) => {
                    debug!("metadata: id lookup for {:?} failed: {:#}", title, e);
                    Default::default()
                }
            };
            let imdb_id = if ids.imdb.is_empty() { imdb } else { ids.imdb };
            let tvdb_id = ids.tvdb;

            let omdb = MetadataQuery::Omdb {
                imdb_id: imdb_id.clone(),
            };
            merge_details(&mut details, self.lookup(omdb, false).await);
            if dbid != 0 {
                let streams = MetadataQuery::StreamDetails {
                    dbid,
                    media_type: kind,
                };
                merge_details(&mut details, self.lookup(streams, false).await);
            }
            let top250 = MetadataQuery::Top250 {
                imdb_id: imdb_id.clone(),
            };
            merge_details(&mut details, self.lookup(top250, false).await);

            if kind == MediaType::Episode {
                let tvdb = MetadataQuery::TvdbDetails {
                    imdb_id: imdb_id.clone(),
                    tvdb_id: tvdb_id.clone(),
                };
                merge_details(&mut details, self.lookup(tvdb, false).await);
            }

            if kind == MediaType::Movie {
                let tmdb = MetadataQuery::TmdbDetails {
                    imdb_id: imdb_id.clone(),
                };
                merge_details(&mut details, self.lookup(tmdb, false).await);
                if !imdb_id.is_empty()
                    && skin_setting(host, SkinSetting::AnimatedPosters).await
                {
                    let animated = MetadataQuery::AnimatedArtwork {
                        imdb_id: imdb_id.clone(),
                    };
                    merge_details(&mut details, self.lookup(animated, false).await);
                }
            }

            if skin_setting(host, SkinSetting::ExtendedArt).await {
                let tmdb_id = match details.get("tmdb_id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                };
                let extended = MetadataQuery::ExtendedArtwork {
                    imdb_id,
                    tvdb_id,
                    tmdb_id,
                    media_type: kind,
                };
                merge_details(&mut details, self.lookup(extended, false).await);
            }
        }

        if title == label(host, "Player.Title").await {
            let props = flatten(&details, &self.config.property_prefix);
            self.props.set_all(&props).await;
        } else {
            debug!("monitor: video changed while resolving {:?}, discarding", title);
        }
    }

    async fn set_music_properties(&self) {
        let host = self.host.as_ref();
        let title_org = label(host, "MusicPlayer.Title").await;
        let mut title = title_org.clone();
        let mut artist = label(host, "MusicPlayer.Artist").await;
        let album = label(host, "MusicPlayer.Album").await;
        let disc = label(host, "MusicPlayer.DiscNumber").await;
        let comment = label(host, "MusicPlayer.Comment").await;

        if artist.is_empty() {
            if let Some((a, t)) = split_stream_title(&title) {
                artist = a;
                title = t;
            }
        }
        if artist.is_empty() || !skin_setting(host, SkinSetting::MusicArt).await {
            return;
        }

        let query = MetadataQuery::MusicArtwork {
            artist,
            album,
            title,
            disc,
        };
        let mut result = self.lookup(query, false).await;
        let extended = result
            .get("extendedplot")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let (Some(plot), false) = (extended, comment.is_empty()) {
            result.insert(
                "extendedplot".to_string(),
                Value::String(format!("{} -- {}", plot, clean_comment(&comment))),
            );
        }

        let props = flatten(&result, &self.config.property_prefix);
        if title_org == label(host, "MusicPlayer.Title").await {
            self.props.set_all(&props).await;
        } else {
            debug!("monitor: track changed while resolving {:?}, discarding", title_org);
        }
    }

    async fn set_livetv_properties(&self, title: &str) {
        let host = self.host.as_ref();
        let channel = label(host, "VideoPlayer.ChannelName").await;
        let mut props = Vec::new();

        if skin_setting(host, SkinSetting::PvrThumbs).await {
            let genre = label(host, "VideoPlayer.Genre").await;
            let query = MetadataQuery::PvrArtwork {
                title: title.to_string(),
                channel: channel.clone(),
                genre,
            };
            props = flatten(&self.lookup(query, false).await, &self.config.property_prefix);
        }
        match self.metadata.channel_logo(&channel).await {
            Ok(Some(logo)) => props.push((self.prop_key("ChannelLogo"), logo)),
            Ok(None) => {}
            Err(e) => debug!("metadata: channel logo for {:?} failed: {:#}", channel, e),
        }

        if title == label(host, "Player.Title").await {
            self.props.set_all(&props).await;
        }
    }

    /// Auto-show the OSD info panel for the skin-configured number of seconds.
    async fn show_info_panel(&self) {
        let host = self.host.as_ref();
        let Ok(seconds) = label(host, INFO_PANEL_SECONDS_LABEL)
            .await
            .trim()
            .parse::<i64>()
        else {
            return;
        };
        if seconds <= 0 || self.info_panel_shown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Show OSD info panel for {}s", seconds);
        if self.props.store().get(SCREENSAVER_PROP).await.as_deref() == Some("true") {
            return;
        }

        let token = self.session_token();
        let mut retries = 0;
        while retries != INFO_PANEL_ATTEMPTS && check(host, "!Player.ShowInfo").await {
            if !Self::pause(&token, INFO_PANEL_POLL).await {
                return;
            }
            if check(host, "!Player.ShowInfo + Window.IsActive(fullscreenvideo)").await {
                if let Err(e) = host.execute(HostCommand::ToggleInfo).await {
                    debug!("host: toggle info failed: {:#}", e);
                }
            }
            retries += 1;
        }

        let display = Duration::from_secs(seconds.unsigned_abs());
        if !Self::pause(&token, display).await {
            return;
        }
        if check(host, "Player.ShowInfo + Window.IsActive(fullscreenvideo)").await {
            if let Err(e) = host.execute(HostCommand::ToggleInfo).await {
                debug!("host: toggle info failed: {:#}", e);
            }
        }
    }
}

// ── watchers ──────────────────────────────────────────────────────────────────

struct RadioTarget {
    shared: Arc<Shared>,
}

#[async_trait]
impl PollTarget for RadioTarget {
    fn name(&self) -> &'static str {
        "radio"
    }

    async fn is_live(&self) -> bool {
        check(self.shared.host.as_ref(), "Player.HasAudio").await
    }

    async fn read(&self) -> String {
        label(self.shared.host.as_ref(), "MusicPlayer.Title").await
    }

    async fn publish(&self, _title: &str) {
        self.shared.props.reset().await;
        self.shared.set_music_properties().await;
    }
}

struct LiveTvTarget {
    shared: Arc<Shared>,
}

#[async_trait]
impl PollTarget for LiveTvTarget {
    fn name(&self) -> &'static str {
        "livetv"
    }

    async fn is_live(&self) -> bool {
        check(self.shared.host.as_ref(), "Player.HasVideo").await
    }

    async fn read(&self) -> String {
        label(self.shared.host.as_ref(), "Player.Title").await
    }

    fn accepts(&self, title: &str) -> bool {
        !title.is_empty()
    }

    async fn publish(&self, title: &str) {
        self.shared.props.reset().await;
        self.shared.set_livetv_properties(title).await;
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn widget_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Split an internet-stream title like "Artist - Title" into its parts.
/// The first separator present wins; only the first two segments are used.
pub fn split_stream_title(title: &str) -> Option<(String, String)> {
    let sep = STREAM_TITLE_SEPARATORS
        .iter()
        .find(|sep| title.contains(*sep))?;
    let mut parts = title.split(sep);
    let artist = parts.next().unwrap_or_default().trim().to_string();
    let title = parts.next().unwrap_or_default().trim().to_string();
    Some((artist, title))
}

fn clean_comment(comment: &str) -> String {
    comment
        .replace('\n', " ")
        .replace('\r', "")
        .trim_end()
        .to_string()
}
