//! Dialog state shared by the table and the add/edit/delete dialogs of one screen.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("{0} used outside of its provider")]
    Unbound(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DialogKind {
    Add,
    Edit,
    Delete,
    BulkDelete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogState<R> {
    pub open: Option<DialogKind>,
    pub current_row: Option<R>,
    pub selected_rows: Vec<R>,
    /// Message of the last failed mutation, shown while the dialog stays open.
    pub last_error: Option<String>,
}

impl<R> Default for DialogState<R> {
    fn default() -> Self {
        Self {
            open: None,
            current_row: None,
            selected_rows: Vec::new(),
            last_error: None,
        }
    }
}

/// Handle to a screen's dialog state. Clones share the state; an unbound
/// handle fails every access with [`ScopeError::Unbound`].
#[derive(Debug)]
pub struct DialogScope<R> {
    name: &'static str,
    inner: Option<Arc<RwLock<DialogState<R>>>>,
}

impl<R> Clone for DialogScope<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: self.inner.clone(),
        }
    }
}

impl<R: Clone> DialogScope<R> {
    pub fn bound(name: &'static str) -> Self {
        Self {
            name,
            inner: Some(Arc::new(RwLock::new(DialogState::default()))),
        }
    }

    pub fn unbound(name: &'static str) -> Self {
        Self { name, inner: None }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_some()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut DialogState<R>) -> T) -> Result<T, ScopeError> {
        let inner = self.inner.as_ref().ok_or(ScopeError::Unbound(self.name))?;
        let mut state = inner.write().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut *state))
    }

    pub fn snapshot(&self) -> Result<DialogState<R>, ScopeError> {
        let inner = self.inner.as_ref().ok_or(ScopeError::Unbound(self.name))?;
        let state = inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.clone())
    }

    pub fn open(&self, kind: DialogKind, row: Option<R>) -> Result<(), ScopeError> {
        self.with_state(|state| {
            state.open = Some(kind);
            state.current_row = row;
            state.last_error = None;
        })
    }

    pub fn close(&self) -> Result<(), ScopeError> {
        self.with_state(|state| {
            state.open = None;
            state.current_row = None;
            state.last_error = None;
        })
    }

    /// Record a failed mutation. The dialog stays open so the user can retry.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), ScopeError> {
        let message = message.into();
        self.with_state(|state| state.last_error = Some(message))
    }

    pub fn set_selected_rows(&self, rows: Vec<R>) -> Result<(), ScopeError> {
        self.with_state(|state| state.selected_rows = rows)
    }

    pub fn current_row(&self) -> Result<Option<R>, ScopeError> {
        self.with_state(|state| state.current_row.clone())
    }

    pub fn is_open(&self, kind: DialogKind) -> Result<bool, ScopeError> {
        self.with_state(|state| state.open == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::{
        accumulator::LoadOutcome,
        list_fetcher::StaticListFetcher,
        reference_selector::{ReferenceListSelector, SelectorConfig},
    };

    #[derive(Debug, Clone, PartialEq)]
    struct DealRow {
        party_name: String,
    }

    #[test]
    fn unbound_scope_reports_its_name() {
        let scope: DialogScope<DealRow> = DialogScope::unbound("PaddyPurchaseDeals");
        assert_eq!(
            scope.open(DialogKind::Add, None),
            Err(ScopeError::Unbound("PaddyPurchaseDeals"))
        );
        assert_eq!(
            scope.snapshot().unwrap_err().to_string(),
            "PaddyPurchaseDeals used outside of its provider"
        );
    }

    #[test]
    fn failed_mutation_keeps_dialog_open() {
        let scope = DialogScope::bound("PaddyPurchaseDeals");
        let row = DealRow {
            party_name: "Acme Traders".into(),
        };
        scope.open(DialogKind::Edit, Some(row.clone())).unwrap();
        scope.fail("Deal could not be saved").unwrap();

        let state = scope.snapshot().unwrap();
        assert_eq!(state.open, Some(DialogKind::Edit));
        assert_eq!(state.current_row, Some(row));
        assert_eq!(state.last_error.as_deref(), Some("Deal could not be saved"));

        scope.close().unwrap();
        assert_eq!(scope.snapshot().unwrap(), DialogState::default());
    }

    #[test]
    fn clones_share_state() {
        let table = DialogScope::bound("GunnyMovements");
        let dialog = table.clone();
        table
            .set_selected_rows(vec![
                DealRow {
                    party_name: "A".into(),
                },
                DealRow {
                    party_name: "B".into(),
                },
            ])
            .unwrap();
        table.open(DialogKind::BulkDelete, None).unwrap();

        assert!(dialog.is_open(DialogKind::BulkDelete).unwrap());
        assert_eq!(dialog.snapshot().unwrap().selected_rows.len(), 2);
    }

    #[tokio::test]
    async fn edit_dialog_seeds_party_selector_with_current_row() {
        let scope = DialogScope::bound("PaddyPurchaseDeals");
        scope
            .open(
                DialogKind::Edit,
                Some(DealRow {
                    party_name: "Zenith Agro".into(),
                }),
            )
            .unwrap();

        let mut parties: Vec<String> = (1..=30).map(|i| format!("Party {i:02}")).collect();
        parties.push("Zenith Agro".into());
        let selector = ReferenceListSelector::new(
            Arc::new(StaticListFetcher::new(parties)),
            SelectorConfig::default(),
        );

        let selected = scope.current_row().unwrap().map(|row| row.party_name);
        let outcome = selector.open("mill-1", selected).await;
        assert_eq!(outcome, LoadOutcome::Loaded { appended: 21 });
        assert_eq!(selector.items()[0], "Zenith Agro");
        assert_eq!(selector.items().len(), 21);
    }
}
