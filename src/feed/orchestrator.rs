//! Feed orchestration: parameter changes, loads, and completion handling.
//!
//! Fetches run as spawned tasks and report back through a channel as
//! [`FeedEvent`]s. [`FeedOrchestrator::handle_event`] is the only place the
//! accumulated [`FeedState`] changes after a fetch, and it discards
//! completions from superseded requests using a generation counter.
//!
//! The generation advances whenever the provider, content kind or query
//! changes, and whenever an initial/refresh load starts. A completion
//! tagged with an older generation belongs to a request nobody is waiting
//! for any more and is dropped without touching state.

use super::ads;
use super::masonry::MasonryLayout;
use super::pagination::FeedState;
use super::selection::SelectionLog;
use super::types::{ContentKind, FeedItem, Page, SelectedItem};
use crate::provider::{FeedRequest, ProviderError, ProviderKind, ProviderRegistry};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Capacity of the completion channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Which trigger issued a fetch, and therefore how its page is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// First page after start, a provider/kind switch, or a search.
    Initial,
    /// User-initiated reload; same as `Initial` plus the refreshing flag.
    Refresh,
    /// Next page appended to the current feed.
    More,
}

/// Completion events from background fetch tasks.
#[derive(Debug)]
pub enum FeedEvent {
    /// A page fetch finished.
    ///
    /// Fields:
    /// - `generation`: The generation counter when this fetch was spawned
    /// - `mode`: The trigger that issued the fetch
    /// - `result`: The normalized page or the error that ended the fetch
    PageLoaded {
        generation: u64,
        mode: LoadMode,
        result: Result<Page, ProviderError>,
    },
}

/// Owns the feed parameters, the accumulated state and the selection log.
pub struct FeedOrchestrator {
    providers: ProviderRegistry,
    provider: ProviderKind,
    kind: ContentKind,
    query: String,

    state: FeedState,
    selections: SelectionLog,

    /// Incremented on every parameter change and every initial/refresh load.
    /// Each fetch carries the value current at spawn time; completions with a
    /// different value are stale.
    generation: u64,
    /// Spawned fetches whose completion has not been handled yet.
    in_flight: usize,

    event_tx: mpsc::Sender<FeedEvent>,
    event_rx: mpsc::Receiver<FeedEvent>,
}

impl FeedOrchestrator {
    pub fn new(providers: ProviderRegistry, provider: ProviderKind, kind: ContentKind) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            providers,
            provider,
            kind,
            query: String::new(),
            state: FeedState::new(),
            selections: SelectionLog::new(),
            generation: 0,
            in_flight: 0,
            event_tx,
            event_rx,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Selected items, newest first.
    pub fn selections(&self) -> &[SelectedItem] {
        self.selections.entries()
    }

    // ------------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------------

    /// Loads the first page for the current parameters.
    pub fn start(&mut self) {
        self.load_initial(LoadMode::Initial);
    }

    /// Switches provider and reloads. Selecting the current provider is a no-op.
    pub fn set_provider(&mut self, provider: ProviderKind) -> bool {
        if provider == self.provider {
            return false;
        }
        tracing::debug!(from = %self.provider, to = %provider, "Switching provider");
        self.provider = provider;
        self.advance_generation();
        self.load_initial(LoadMode::Initial);
        true
    }

    /// Switches content kind and reloads. Selecting the current kind is a no-op.
    pub fn set_kind(&mut self, kind: ContentKind) -> bool {
        if kind == self.kind {
            return false;
        }
        tracing::debug!(from = %self.kind, to = %kind, "Switching content kind");
        self.kind = kind;
        self.advance_generation();
        self.load_initial(LoadMode::Initial);
        true
    }

    /// Records the query text. Nothing is fetched until [`search`](Self::search).
    ///
    /// The current items stay visible but the cursor is dropped: it belongs
    /// to the previous query's page sequence, so loading more is disabled
    /// until the new query's first page arrives.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query {
            return;
        }
        self.query = query;
        self.advance_generation();
        self.state.invalidate_cursor();
    }

    /// Reloads the first page for the current query.
    pub fn search(&mut self) {
        self.load_initial(LoadMode::Initial);
    }

    /// Reloads the first page, flagging the load as a refresh.
    pub fn refresh(&mut self) {
        self.load_initial(LoadMode::Refresh);
    }

    /// Requests the next page.
    ///
    /// Returns `false` without issuing a request when a load is already in
    /// flight or the feed is exhausted.
    pub fn load_more(&mut self) -> bool {
        let Some(cursor) = self.state.begin_load_more() else {
            tracing::trace!(
                loading_initial = self.state.is_loading_initial(),
                loading_more = self.state.is_loading_more(),
                exhausted = self.state.next_cursor().is_none(),
                "Load more skipped"
            );
            return false;
        };
        self.spawn_fetch(LoadMode::More, Some(cursor));
        true
    }

    /// Records a pick of a display item under the current content kind.
    pub fn select(&mut self, item: &FeedItem) -> Option<&SelectedItem> {
        self.selections.select(item, self.kind)
    }

    // ------------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------------

    /// Accumulated items decorated with sponsored placeholders.
    ///
    /// Recomputed on every call.
    pub fn display_items(&self) -> Vec<FeedItem> {
        ads::decorate(self.state.items(), self.provider)
    }

    /// Two-column packing of [`display_items`](Self::display_items).
    pub fn layout(&self) -> MasonryLayout {
        MasonryLayout::pack(&self.display_items())
    }

    // ------------------------------------------------------------------------
    // Completion handling
    // ------------------------------------------------------------------------

    /// Applies a completion event to the feed state.
    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::PageLoaded {
                generation,
                mode,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);

                if generation != self.generation {
                    tracing::debug!(
                        expected = self.generation,
                        got = generation,
                        mode = ?mode,
                        "Ignoring stale page (generation mismatch)"
                    );
                    return;
                }

                match mode {
                    LoadMode::Initial | LoadMode::Refresh => self.state.complete_initial(result),
                    LoadMode::More => self.state.complete_load_more(result),
                }
                tracing::debug!(
                    mode = ?mode,
                    items = self.state.items().len(),
                    exhausted = self.state.next_cursor().is_none(),
                    "Page applied"
                );
            }
        }
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns `false` when nothing is in flight.
    pub async fn process_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.event_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Applies completions until no fetch is in flight.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Starts a new generation, abandoning every in-flight fetch.
    fn advance_generation(&mut self) {
        self.generation += 1;
        self.state.abandon_in_flight();
        tracing::trace!(generation = self.generation, "Feed generation advanced");
    }

    fn load_initial(&mut self, mode: LoadMode) {
        // A fresh first page supersedes any pending load-more
        self.advance_generation();
        self.state.begin_initial(mode == LoadMode::Refresh);
        self.spawn_fetch(mode, None);
    }

    fn spawn_fetch(&mut self, mode: LoadMode, cursor: Option<String>) {
        let request = FeedRequest {
            provider: self.provider,
            kind: self.kind,
            query: self.query.clone(),
            cursor,
        };
        let provider = self.providers.get(self.provider);
        let generation = self.generation;
        let tx = self.event_tx.clone();
        self.in_flight += 1;

        tracing::debug!(
            provider = %request.provider,
            kind = %request.kind,
            mode = ?mode,
            generation = generation,
            "Spawning page fetch"
        );

        tokio::spawn(async move {
            let result = match catch_task_panic(provider.fetch_page(&request)).await {
                Ok(result) => result,
                Err(panic_msg) => {
                    tracing::error!(task = "page_fetch", error = %panic_msg, "Background task panicked");
                    Err(ProviderError::Panicked(panic_msg))
                }
            };

            if let Err(e) = tx
                .send(FeedEvent::PageLoaded {
                    generation,
                    mode,
                    result,
                })
                .await
            {
                tracing::warn!(error = %e, event = "PageLoaded", "Channel send failed (receiver dropped)");
            }
        });
    }
}

/// Wraps a future to catch panics and convert them to errors.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    })
}
