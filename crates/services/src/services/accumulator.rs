//! Page accumulation for a scoped, searchable option list.
//!
//! The accumulator is a plain state machine: it hands out [`FetchTicket`]s and
//! folds their results back in through [`Accumulator::settle`]. It never awaits,
//! so the caller decides how fetches are driven. Every reset bumps a generation
//! counter and tickets from an older generation are discarded on arrival.

use super::list_fetcher::{FetchError, LabelPage, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The owning dialog is closed.
    Closed,
    /// A fetch for this session is still pending.
    InFlight,
    /// The last page has been loaded.
    Exhausted,
    /// Scroll position is not close enough to the end of the list.
    NotNearBottom,
    /// A scroll-triggered load fired too recently.
    Throttled,
    /// Scope or search term did not change.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { appended: usize },
    Skipped(SkipReason),
    /// The response belonged to a session that has since been reset.
    Discarded,
    /// The fetch failed; the list keeps what it had and stops paging.
    Failed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPurpose {
    FirstPage,
    NextPage,
    Pin,
}

/// Permission to run exactly one fetch for one accumulator generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    purpose: FetchPurpose,
    request: PageRequest,
    /// Options already appended by the fetch this ticket follows up on.
    carried: usize,
}

impl FetchTicket {
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of folding a fetch result into the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Done(LoadOutcome),
    /// The first page did not contain the selected value; fetch this ticket next.
    FollowUp(FetchTicket),
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    page_size: u32,
    scope_id: Option<String>,
    search: String,
    page: u32,
    items: Vec<String>,
    has_more: bool,
    in_flight: Option<FetchPurpose>,
    generation: u64,
    selected_value: Option<String>,
    pinned: Option<String>,
    pin_checked: bool,
    last_error: Option<String>,
}

impl Accumulator {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            scope_id: None,
            search: String::new(),
            page: 0,
            items: Vec::new(),
            has_more: false,
            in_flight: None,
            generation: 0,
            selected_value: None,
            pinned: None,
            pin_checked: false,
            last_error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.scope_id.is_some()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Last page successfully merged, 0 before the first one lands.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_loading_more(&self) -> bool {
        self.in_flight == Some(FetchPurpose::NextPage)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Options in display order. The pinned selection leads while no search is
    /// active, and later pages do not repeat it.
    pub fn items(&self) -> Vec<String> {
        let Some(pinned) = self.pinned.as_ref().filter(|_| self.search.is_empty()) else {
            return self.items.clone();
        };
        std::iter::once(pinned)
            .chain(self.items.iter().filter(|item| !same_label(item, pinned)))
            .cloned()
            .collect()
    }

    /// Start a session for `scope_id` with an empty search.
    pub fn open(&mut self, scope_id: String, selected_value: Option<String>) -> FetchTicket {
        let selected_value = selected_value.filter(|v| !v.trim().is_empty());
        if self.scope_id.as_deref() != Some(scope_id.as_str()) || self.selected_value != selected_value {
            self.pinned = None;
            self.pin_checked = false;
        }
        self.scope_id = Some(scope_id);
        self.selected_value = selected_value;
        self.restart(String::new())
    }

    /// Drop everything; pending responses become stale.
    pub fn close(&mut self) {
        self.generation += 1;
        self.scope_id = None;
        self.search.clear();
        self.page = 0;
        self.items.clear();
        self.has_more = false;
        self.in_flight = None;
        self.selected_value = None;
        self.pinned = None;
        self.pin_checked = false;
        self.last_error = None;
    }

    pub fn change_scope(&mut self, scope_id: String) -> Result<FetchTicket, SkipReason> {
        match self.scope_id.as_deref() {
            None => Err(SkipReason::Closed),
            Some(current) if current == scope_id => Err(SkipReason::Unchanged),
            Some(_) => {
                self.scope_id = Some(scope_id);
                self.pinned = None;
                self.pin_checked = false;
                Ok(self.restart(String::new()))
            }
        }
    }

    pub fn change_search(&mut self, term: String) -> Result<FetchTicket, SkipReason> {
        if !self.is_open() {
            return Err(SkipReason::Closed);
        }
        if term == self.search {
            return Err(SkipReason::Unchanged);
        }
        Ok(self.restart(term))
    }

    pub fn begin_next_page(&mut self) -> Result<FetchTicket, SkipReason> {
        if !self.is_open() {
            return Err(SkipReason::Closed);
        }
        if self.in_flight.is_some() {
            return Err(SkipReason::InFlight);
        }
        if !self.has_more {
            return Err(SkipReason::Exhausted);
        }
        self.in_flight = Some(FetchPurpose::NextPage);
        Ok(self.ticket(FetchPurpose::NextPage, self.page + 1, self.search.clone()))
    }

    pub fn settle(&mut self, ticket: FetchTicket, result: Result<LabelPage, FetchError>) -> Settled {
        if ticket.generation != self.generation || !self.is_open() {
            return Settled::Done(LoadOutcome::Discarded);
        }

        match (ticket.purpose, result) {
            (FetchPurpose::Pin, Ok(page)) => {
                let found = self.selected_value.as_deref().and_then(|selected| {
                    page.labels
                        .into_iter()
                        .find(|label| same_label(label, selected))
                });
                self.pinned = found.or_else(|| self.selected_value.clone());
                self.pin_checked = true;
                self.in_flight = None;
                Settled::Done(LoadOutcome::Loaded {
                    appended: ticket.carried + usize::from(self.pinned.is_some()),
                })
            }
            (FetchPurpose::Pin, Err(e)) => {
                // The record already stores this value, so it stays renderable.
                self.pinned = self.selected_value.clone();
                self.pin_checked = true;
                self.last_error = Some(e.to_string());
                self.in_flight = None;
                Settled::Done(LoadOutcome::Failed(e))
            }
            (purpose, Ok(page)) => {
                let appended = page.labels.len();
                self.page = ticket.request.page;
                self.has_more = page.has_more;
                self.items.extend(page.labels);

                if purpose == FetchPurpose::FirstPage {
                    if let Some(mut pin) = self.pin_ticket() {
                        pin.carried = appended;
                        self.in_flight = Some(FetchPurpose::Pin);
                        return Settled::FollowUp(pin);
                    }
                }
                self.in_flight = None;
                Settled::Done(LoadOutcome::Loaded { appended })
            }
            (_, Err(e)) => {
                self.has_more = false;
                self.last_error = Some(e.to_string());
                self.in_flight = None;
                Settled::Done(LoadOutcome::Failed(e))
            }
        }
    }

    fn restart(&mut self, search: String) -> FetchTicket {
        self.generation += 1;
        self.search = search;
        self.page = 0;
        self.items.clear();
        self.has_more = false;
        self.last_error = None;
        self.in_flight = Some(FetchPurpose::FirstPage);
        self.ticket(FetchPurpose::FirstPage, 1, self.search.clone())
    }

    /// Checked once per scope session, only for the unfiltered list. The check
    /// counts as done when a lookup result is applied, so a lookup superseded by
    /// a search change is issued again once the search is cleared.
    fn pin_ticket(&mut self) -> Option<FetchTicket> {
        if self.pin_checked || !self.search.is_empty() {
            return None;
        }
        let selected = self.selected_value.clone()?;
        if self.items.iter().any(|item| same_label(item, &selected)) {
            self.pin_checked = true;
            return None;
        }
        Some(self.ticket(FetchPurpose::Pin, 1, selected))
    }

    fn ticket(&self, purpose: FetchPurpose, page: u32, search: String) -> FetchTicket {
        FetchTicket {
            generation: self.generation,
            purpose,
            request: PageRequest {
                scope_id: self.scope_id.clone().unwrap_or_default(),
                page,
                page_size: self.page_size,
                search,
            },
            carried: 0,
        }
    }
}

/// Labels match ignoring case and surrounding whitespace.
fn same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(labels: &[&str], has_more: bool) -> LabelPage {
        LabelPage {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            has_more,
        }
    }

    fn loaded(settled: Settled) -> usize {
        match settled {
            Settled::Done(LoadOutcome::Loaded { appended }) => appended,
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn pages_append_in_arrival_order_without_dedup() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        assert_eq!(first.request().page, 1);
        assert_eq!(loaded(acc.settle(first, Ok(page(&["A", "B"], true)))), 2);

        let next = acc.begin_next_page().unwrap();
        assert_eq!(next.request().page, 2);
        assert!(acc.is_loading_more());
        assert_eq!(loaded(acc.settle(next, Ok(page(&["B", "C"], false)))), 2);

        assert_eq!(acc.items(), ["A", "B", "B", "C"]);
        assert_eq!(acc.page(), 2);
        assert!(!acc.is_loading());
    }

    #[test]
    fn load_more_after_last_page_is_a_no_op() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        acc.settle(first, Ok(page(&["A"], false)));

        for _ in 0..3 {
            assert_eq!(acc.begin_next_page(), Err(SkipReason::Exhausted));
        }
        assert_eq!(acc.items().len(), 1);
    }

    #[test]
    fn second_load_more_while_pending_is_skipped() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        assert_eq!(acc.begin_next_page(), Err(SkipReason::InFlight));
        acc.settle(first, Ok(page(&["A", "B"], true)));

        let _pending = acc.begin_next_page().unwrap();
        assert_eq!(acc.begin_next_page(), Err(SkipReason::InFlight));
    }

    #[test]
    fn search_change_clears_items_and_restarts_at_page_one() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        acc.settle(first, Ok(page(&["A", "B"], true)));

        let search = acc.change_search("ac".into()).unwrap();
        assert!(acc.items().is_empty());
        assert_eq!(search.request().page, 1);
        assert_eq!(search.request().search, "ac");
        assert_eq!(acc.change_search("ac".into()), Err(SkipReason::Unchanged));
    }

    #[test]
    fn stale_response_is_discarded_after_reset() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        let second = acc.change_search("b".into()).unwrap();

        assert_eq!(
            acc.settle(first, Ok(page(&["A"], true))),
            Settled::Done(LoadOutcome::Discarded)
        );
        // The newer session is still waiting on its own fetch.
        assert!(acc.is_loading());
        assert_eq!(loaded(acc.settle(second, Ok(page(&["B"], false)))), 1);
        assert_eq!(acc.items(), ["B"]);
    }

    #[test]
    fn response_after_close_is_not_applied() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        acc.close();

        assert_eq!(
            acc.settle(first, Ok(page(&["A"], true))),
            Settled::Done(LoadOutcome::Discarded)
        );
        assert!(acc.items().is_empty());
        assert_eq!(acc.begin_next_page(), Err(SkipReason::Closed));
    }

    #[test]
    fn selected_value_missing_from_first_page_is_pinned() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Acme Traders".into()));

        let pin = match acc.settle(first, Ok(page(&["Bharat Rice", "Cedar Agro"], true))) {
            Settled::FollowUp(ticket) => ticket,
            other => panic!("expected pin follow-up, got {other:?}"),
        };
        assert_eq!(pin.request().search, "Acme Traders");
        assert!(acc.is_loading());
        assert!(!acc.is_loading_more());

        // Two options from page one plus the pinned selection.
        assert_eq!(loaded(acc.settle(pin, Ok(page(&["ACME TRADERS"], false)))), 3);
        assert_eq!(acc.items(), ["ACME TRADERS", "Bharat Rice", "Cedar Agro"]);
        // Paging continues from the unfiltered first page.
        assert!(acc.has_more());
        assert_eq!(acc.begin_next_page().unwrap().request().page, 2);
    }

    #[test]
    fn pin_is_checked_once_per_scope_and_hidden_while_searching() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Acme Traders".into()));
        let Settled::FollowUp(pin) = acc.settle(first, Ok(page(&["Bharat Rice"], false))) else {
            panic!("expected pin follow-up");
        };
        acc.settle(pin, Ok(page(&[], false)));
        assert_eq!(acc.items(), ["Acme Traders", "Bharat Rice"]);

        let search = acc.change_search("bha".into()).unwrap();
        acc.settle(search, Ok(page(&["Bharat Rice"], false)));
        assert_eq!(acc.items(), ["Bharat Rice"]);

        let cleared = acc.change_search(String::new()).unwrap();
        assert_eq!(loaded(acc.settle(cleared, Ok(page(&["Bharat Rice"], false)))), 1);
        assert_eq!(acc.items(), ["Acme Traders", "Bharat Rice"]);
    }

    #[test]
    fn selected_value_on_first_page_needs_no_pin() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Acme Traders".into()));
        assert_eq!(loaded(acc.settle(first, Ok(page(&["Acme Traders"], false)))), 1);
        assert_eq!(acc.items(), ["Acme Traders"]);
    }

    #[test]
    fn failed_pin_lookup_still_pins_the_stored_value() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Acme Traders".into()));
        let Settled::FollowUp(pin) = acc.settle(first, Ok(page(&["Bharat Rice"], false))) else {
            panic!("expected pin follow-up");
        };
        let settled = acc.settle(pin, Err(FetchError::Network("connection reset".into())));
        assert!(matches!(settled, Settled::Done(LoadOutcome::Failed(_))));
        assert_eq!(acc.items(), ["Acme Traders", "Bharat Rice"]);
        assert!(acc.last_error().is_some());
    }

    #[test]
    fn fetch_failure_keeps_items_and_stops_paging() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        acc.settle(first, Ok(page(&["A", "B"], true)));

        let next = acc.begin_next_page().unwrap();
        let settled = acc.settle(next, Err(FetchError::Timeout));
        assert_eq!(settled, Settled::Done(LoadOutcome::Failed(FetchError::Timeout)));
        assert_eq!(acc.items(), ["A", "B"]);
        assert_eq!(acc.begin_next_page(), Err(SkipReason::Exhausted));
        assert_eq!(acc.last_error(), Some("timeout"));
    }

    #[test]
    fn scope_change_resets_session() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), None);
        acc.settle(first, Ok(page(&["A"], false)));

        assert_eq!(acc.change_scope("mill-1".into()), Err(SkipReason::Unchanged));
        let moved = acc.change_scope("mill-2".into()).unwrap();
        assert_eq!(moved.request().scope_id, "mill-2");
        assert!(acc.items().is_empty());

        acc.close();
        assert_eq!(acc.change_scope("mill-3".into()), Err(SkipReason::Closed));
        assert_eq!(acc.change_search("x".into()), Err(SkipReason::Closed));
    }

    #[test]
    fn pin_lookup_superseded_by_search_is_retried_after_clearing() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Acme Traders".into()));
        let Settled::FollowUp(pin) = acc.settle(first, Ok(page(&["Bharat Rice"], false))) else {
            panic!("expected pin follow-up");
        };

        let search = acc.change_search("b".into()).unwrap();
        assert_eq!(
            acc.settle(pin, Ok(page(&["Acme Traders"], false))),
            Settled::Done(LoadOutcome::Discarded)
        );
        acc.settle(search, Ok(page(&["Bharat Rice"], false)));

        let cleared = acc.change_search(String::new()).unwrap();
        let Settled::FollowUp(retry) = acc.settle(cleared, Ok(page(&["Bharat Rice"], false))) else {
            panic!("expected the pin lookup to be issued again");
        };
        assert_eq!(retry.request().search, "Acme Traders");
        assert_eq!(loaded(acc.settle(retry, Ok(page(&["Acme Traders"], false)))), 2);
        assert_eq!(acc.items(), ["Acme Traders", "Bharat Rice"]);
    }

    #[test]
    fn selected_value_on_first_page_matches_ignoring_case() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some(" acme traders".into()));
        let settled = acc.settle(first, Ok(page(&["Acme Traders", "Bharat Rice"], false)));

        assert_eq!(settled, Settled::Done(LoadOutcome::Loaded { appended: 2 }));
        assert_eq!(acc.items(), ["Acme Traders", "Bharat Rice"]);
    }

    #[test]
    fn pinned_selection_is_not_repeated_by_later_pages() {
        let mut acc = Accumulator::new(2);
        let first = acc.open("mill-1".into(), Some("Zenith Agro".into()));
        let Settled::FollowUp(pin) = acc.settle(first, Ok(page(&["Acme", "Bharat"], true))) else {
            panic!("expected pin follow-up");
        };
        assert_eq!(loaded(acc.settle(pin, Ok(page(&["Zenith Agro"], false)))), 3);

        let next = acc.begin_next_page().unwrap();
        acc.settle(next, Ok(page(&["Yash", "zenith agro"], false)));
        assert_eq!(acc.items(), ["Zenith Agro", "Acme", "Bharat", "Yash"]);
    }
}
