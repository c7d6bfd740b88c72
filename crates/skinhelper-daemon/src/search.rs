/// Incremental library search running beside the search UI.
///
/// The UI only ever replaces the query (`set_search`).  A worker task polls
/// it once per interval and runs a search when it differs from the last one,
/// so a burst of keystrokes inside one interval costs a single search.
///
/// Results are published on a `watch` channel.  A new query first publishes
/// empty lists for that query, then the complete result set; a half-filled
/// set is never visible.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use skinhelper_proto::media::{Filter, MediaType, SearchItem, SearchResults};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::host::LibraryAccessor;

const RESULT_KINDS: [MediaType; 3] = [MediaType::Movie, MediaType::TvShow, MediaType::Episode];

pub struct SearchEngine {
    query: watch::Sender<String>,
    results: watch::Receiver<SearchResults>,
    active: Arc<AtomicBool>,
    /// Wakes the worker out of its sleep on `stop_running`.
    stop: CancellationToken,
}

impl SearchEngine {
    /// Start the worker.  It exits on `stop_running` or when `abort` fires.
    pub fn spawn(
        library: Arc<dyn LibraryAccessor>,
        poll: Duration,
        abort: &CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (query_tx, query_rx) = watch::channel(String::new());
        let (results_tx, results_rx) = watch::channel(SearchResults::default());
        let active = Arc::new(AtomicBool::new(true));
        let stop = abort.child_token();

        let worker = Worker {
            library,
            query: query_rx,
            results: results_tx,
            active: active.clone(),
            stop: stop.clone(),
            poll,
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                query: query_tx,
                results: results_rx,
                active,
                stop,
            },
            handle,
        )
    }

    /// Replace the current query.  The worker picks it up on its next tick.
    pub fn set_search(&self, text: &str) {
        self.query.send_replace(text.to_string());
    }

    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    pub fn stop_running(&self) {
        self.active.store(false, Ordering::Release);
        self.stop.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.stop.is_cancelled()
    }

    /// A receiver that sees every published result set.
    pub fn results(&self) -> watch::Receiver<SearchResults> {
        self.results.clone()
    }
}

struct Worker {
    library: Arc<dyn LibraryAccessor>,
    query: watch::Receiver<String>,
    results: watch::Sender<SearchResults>,
    active: Arc<AtomicBool>,
    stop: CancellationToken,
    poll: Duration,
}

impl Worker {
    async fn run(self) {
        info!("search: worker started");
        let mut last = String::new();

        while !self.stop.is_cancelled() && self.active.load(Ordering::Acquire) {
            let current = self.query.borrow().clone();
            if current != last {
                let mut cleared = SearchResults::default();
                cleared.reset(&current);
                self.results.send_replace(cleared);

                let results = do_search(self.library.as_ref(), &current).await;
                debug!(
                    "search: {:?} → {} movies, {} tvshows, {} episodes",
                    current,
                    results.movies.len(),
                    results.tvshows.len(),
                    results.episodes.len()
                );
                self.results.send_replace(results);
                last = current;
            }

            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.poll) => {}
            }
        }
        info!("search: worker stopped");
    }
}

/// Run one search.  An empty query yields three empty lists without touching
/// the library.  A failing list query leaves only that list empty.
pub async fn do_search(library: &dyn LibraryAccessor, query: &str) -> SearchResults {
    let mut results = SearchResults::default();
    results.reset(query);
    if query.is_empty() {
        return results;
    }

    let filters = [Filter::title_contains(query)];
    for kind in RESULT_KINDS {
        let records = match library.query(kind, &filters).await {
            Ok(records) => records,
            Err(e) => {
                warn!("search: {} query for {:?} failed: {:#}", kind, query, e);
                continue;
            }
        };

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let mut record = library.prepare(record).await;
            if kind == MediaType::TvShow {
                record.file = format!("videodb://tvshows/titles/{}", record.id);
                record.is_folder = true;
            }
            items.push(SearchItem::from(record));
        }
        if let Some(list) = results.list_mut(kind) {
            *list = items;
        }
    }
    results
}
