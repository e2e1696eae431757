use axum::Router;

use crate::AppState;

pub mod forms;
pub mod health;
pub mod paddy_purchase_deals;
pub mod reference_entries;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router(state))
        .merge(forms::router(state))
        .merge(paddy_purchase_deals::router(state))
        .merge(reference_entries::router(state))
}
