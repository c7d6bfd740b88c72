//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use skinhelper_daemon::host::{
    Details, ExternalIds, Host, HostCommand, LibraryAccessor, MetadataQuery, MetadataService,
    VideoLookup,
};
use skinhelper_daemon::input::SearchView;
use skinhelper_proto::media::{Filter, MediaRecord, MediaType};

// ── host ──────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeHost {
    labels: Mutex<HashMap<String, String>>,
    conditions: Mutex<HashMap<String, bool>>,
    executed: Mutex<Vec<HostCommand>>,
}

impl FakeHost {
    pub fn set_label(&self, label: &str, value: &str) {
        self.labels
            .lock()
            .unwrap()
            .insert(label.to_string(), value.to_string());
    }

    pub fn set_condition(&self, condition: &str, value: bool) {
        self.conditions
            .lock()
            .unwrap()
            .insert(condition.to_string(), value);
    }

    pub fn executed(&self) -> Vec<HostCommand> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn info_label(&self, label: &str) -> anyhow::Result<String> {
        Ok(self
            .labels
            .lock()
            .unwrap()
            .get(label)
            .cloned()
            .unwrap_or_default())
    }

    async fn condition(&self, condition: &str) -> anyhow::Result<bool> {
        Ok(self
            .conditions
            .lock()
            .unwrap()
            .get(condition)
            .copied()
            .unwrap_or(false))
    }

    async fn execute(&self, command: HostCommand) -> anyhow::Result<()> {
        self.executed.lock().unwrap().push(command);
        Ok(())
    }
}

// ── metadata ──────────────────────────────────────────────────────────────────

/// Answers each query variant with a canned mapping and records every call.
#[derive(Default)]
pub struct FakeMetadata {
    responses: Mutex<HashMap<&'static str, Details>>,
    calls: Mutex<Vec<(MetadataQuery, bool)>>,
    delay: Option<Duration>,
    logo: Mutex<Option<String>>,
}

pub fn query_name(query: &MetadataQuery) -> &'static str {
    match query {
        MetadataQuery::Omdb { .. } => "omdb",
        MetadataQuery::StreamDetails { .. } => "streamdetails",
        MetadataQuery::Top250 { .. } => "top250",
        MetadataQuery::TvdbDetails { .. } => "tvdb",
        MetadataQuery::TmdbDetails { .. } => "tmdb",
        MetadataQuery::AnimatedArtwork { .. } => "animated",
        MetadataQuery::ExtendedArtwork { .. } => "extended",
        MetadataQuery::MusicArtwork { .. } => "music",
        MetadataQuery::PvrArtwork { .. } => "pvr",
    }
}

impl FakeMetadata {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn respond(&self, name: &'static str, details: Value) {
        let details = details.as_object().cloned().unwrap_or_default();
        self.responses.lock().unwrap().insert(name, details);
    }

    pub fn set_channel_logo(&self, logo: &str) {
        *self.logo.lock().unwrap() = Some(logo.to_string());
    }

    pub fn calls(&self) -> Vec<(MetadataQuery, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<MetadataQuery> {
        self.calls()
            .into_iter()
            .map(|(q, _)| q)
            .filter(|q| query_name(q) == name)
            .collect()
    }
}

#[async_trait]
impl MetadataService for FakeMetadata {
    async fn resolve_ids(&self, lookup: &VideoLookup) -> anyhow::Result<ExternalIds> {
        Ok(ExternalIds {
            imdb: lookup.imdb_id.clone(),
            tvdb: String::new(),
        })
    }

    async fn resolve(&self, query: &MetadataQuery, ignore_cache: bool) -> anyhow::Result<Details> {
        self.calls
            .lock()
            .unwrap()
            .push((query.clone(), ignore_cache));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(query_name(query))
            .cloned()
            .unwrap_or_default())
    }

    async fn channel_logo(&self, _channel: &str) -> anyhow::Result<Option<String>> {
        Ok(self.logo.lock().unwrap().clone())
    }
}

// ── library ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeLibrary {
    records: Mutex<Vec<MediaRecord>>,
    queries: Mutex<Vec<(MediaType, String)>>,
    failing: Mutex<Vec<MediaType>>,
    delay: Option<Duration>,
}

impl FakeLibrary {
    /// Every list query takes `delay` to answer.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn add(&self, record: MediaRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn fail(&self, kind: MediaType) {
        self.failing.lock().unwrap().push(kind);
    }

    pub fn queries(&self) -> Vec<(MediaType, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LibraryAccessor for FakeLibrary {
    async fn query(&self, kind: MediaType, filters: &[Filter]) -> anyhow::Result<Vec<MediaRecord>> {
        let needle = filters
            .iter()
            .find(|f| f.field == "title")
            .map(|f| f.value.to_lowercase())
            .unwrap_or_default();
        self.queries.lock().unwrap().push((kind, needle.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&kind) {
            anyhow::bail!("{} listing unavailable", kind);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.media_type == kind && r.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn get(&self, kind: MediaType, id: i64) -> anyhow::Result<Option<MediaRecord>> {
        if self.failing.lock().unwrap().contains(&kind) {
            anyhow::bail!("{} {} unavailable", kind, id);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.media_type == kind && r.id == id)
            .cloned())
    }
}

// ── search view ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ViewLog {
    pub labels: Vec<String>,
    pub focus: Vec<i32>,
    pub prompts: usize,
    pub info: Vec<i32>,
    pub dismissals: usize,
    pub closes: usize,
}

/// Records everything the controller asks of the view.
#[derive(Clone, Default)]
pub struct RecordingView(pub std::sync::Arc<Mutex<ViewLog>>);

impl RecordingView {
    pub fn log(&self) -> std::sync::MutexGuard<'_, ViewLog> {
        self.0.lock().unwrap()
    }
}

impl SearchView for RecordingView {
    fn set_query_label(&self, text: &str) {
        self.log().labels.push(text.to_string());
    }

    fn set_focus(&self, control_id: i32) {
        self.log().focus.push(control_id);
    }

    fn request_text(&self) {
        self.log().prompts += 1;
    }

    fn show_item_info(&self, control_id: i32) {
        self.log().info.push(control_id);
    }

    fn dismiss_shutdown_dialog(&self) {
        self.log().dismissals += 1;
    }

    fn close(&self) {
        self.log().closes += 1;
    }
}
