//! Searchable, infinitely scrolling option list behind a combobox.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use ts_rs::TS;

use super::{
    accumulator::{Accumulator, FetchTicket, LoadOutcome, Settled, SkipReason},
    list_fetcher::ListFetcher,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorConfig {
    pub page_size: u32,
    /// Remaining scroll distance (px) under which the next page is requested.
    pub scroll_threshold_px: f64,
    /// Minimum spacing between scroll-triggered loads.
    pub scroll_throttle_ms: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            scroll_threshold_px: 50.0,
            scroll_throttle_ms: 150,
        }
    }
}

/// Geometry of the scrollable option list at the time of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ScrollEvent {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollEvent {
    pub fn distance_to_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// What the combobox renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    pub items: Vec<String>,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub search: String,
    pub has_more: bool,
    pub last_error: Option<String>,
}

struct SelectorState {
    accumulator: Accumulator,
    last_scroll_trigger: Option<Instant>,
}

/// One selector per open dialog field. Clones share the same list.
#[derive(Clone)]
pub struct ReferenceListSelector {
    fetcher: Arc<dyn ListFetcher>,
    config: SelectorConfig,
    state: Arc<Mutex<SelectorState>>,
}

impl ReferenceListSelector {
    pub fn new(fetcher: Arc<dyn ListFetcher>, config: SelectorConfig) -> Self {
        let state = SelectorState {
            accumulator: Accumulator::new(config.page_size),
            last_scroll_trigger: None,
        };
        Self {
            fetcher,
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    // The lock is only ever held for synchronous bookkeeping, never across an await.
    fn state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dialog opened: start a fresh session for `scope_id` and load page one.
    ///
    /// `selected_value` is the value the edited record already holds; it is
    /// pinned to the top of the list if the first page does not contain it.
    pub async fn open(
        &self,
        scope_id: impl Into<String>,
        selected_value: Option<String>,
    ) -> LoadOutcome {
        let ticket = self.state().accumulator.open(scope_id.into(), selected_value);
        self.drive(ticket).await
    }

    /// Dialog closed: clear the list. Responses still in flight are dropped on arrival.
    pub fn close(&self) {
        let mut state = self.state();
        state.accumulator.close();
        state.last_scroll_trigger = None;
    }

    pub fn is_open(&self) -> bool {
        self.state().accumulator.is_open()
    }

    pub async fn set_scope(&self, scope_id: impl Into<String>) -> LoadOutcome {
        let next = self.state().accumulator.change_scope(scope_id.into());
        match next {
            Ok(ticket) => self.drive(ticket).await,
            Err(reason) => LoadOutcome::Skipped(reason),
        }
    }

    /// Replace the search term. Debouncing keystrokes is up to the caller.
    pub async fn set_search(&self, term: impl Into<String>) -> LoadOutcome {
        let next = self.state().accumulator.change_search(term.into());
        match next {
            Ok(ticket) => self.drive(ticket).await,
            Err(reason) => LoadOutcome::Skipped(reason),
        }
    }

    pub fn search(&self) -> String {
        self.state().accumulator.search().to_string()
    }

    pub fn items(&self) -> Vec<String> {
        self.state().accumulator.items()
    }

    pub async fn load_more(&self) -> LoadOutcome {
        let next = self.state().accumulator.begin_next_page();
        match next {
            Ok(ticket) => self.drive(ticket).await,
            Err(reason) => LoadOutcome::Skipped(reason),
        }
    }

    /// Request the next page when the list is scrolled close to its end.
    pub async fn on_scroll(&self, event: ScrollEvent) -> LoadOutcome {
        if event.distance_to_bottom() >= self.config.scroll_threshold_px {
            return LoadOutcome::Skipped(SkipReason::NotNearBottom);
        }

        let ticket = {
            let mut state = self.state();
            let now = Instant::now();
            let window = Duration::from_millis(self.config.scroll_throttle_ms);
            if state
                .last_scroll_trigger
                .is_some_and(|last| now.duration_since(last) < window)
            {
                return LoadOutcome::Skipped(SkipReason::Throttled);
            }
            match state.accumulator.begin_next_page() {
                Ok(ticket) => {
                    // Only scrolls that start a fetch open the throttle window.
                    state.last_scroll_trigger = Some(now);
                    ticket
                }
                Err(reason) => return LoadOutcome::Skipped(reason),
            }
        };

        self.drive(ticket).await
    }

    pub fn view(&self) -> SelectionView {
        let state = self.state();
        let acc = &state.accumulator;
        SelectionView {
            items: acc.items(),
            is_loading: acc.is_loading(),
            is_loading_more: acc.is_loading_more(),
            search: acc.search().to_string(),
            has_more: acc.has_more(),
            last_error: acc.last_error().map(str::to_owned),
        }
    }

    async fn drive(&self, mut ticket: FetchTicket) -> LoadOutcome {
        loop {
            debug!(
                scope_id = %ticket.request().scope_id,
                page = ticket.request().page,
                search = %ticket.request().search,
                "Fetching reference list page"
            );
            let result = self.fetcher.fetch_page(ticket.request()).await;
            let scope_id = ticket.request().scope_id.clone();

            let settled = self.state().accumulator.settle(ticket, result);
            match settled {
                Settled::FollowUp(next) => ticket = next,
                Settled::Done(outcome) => {
                    match &outcome {
                        LoadOutcome::Discarded => {
                            debug!(scope_id = %scope_id, "Discarded stale reference list response")
                        }
                        LoadOutcome::Failed(e) => warn!(
                            scope_id = %scope_id,
                            error = %e,
                            "Reference list fetch failed, keeping current options"
                        ),
                        _ => {}
                    }
                    return outcome;
                }
            }
        }
    }
}
