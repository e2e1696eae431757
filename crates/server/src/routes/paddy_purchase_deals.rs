use std::str::FromStr;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::{
    paddy_purchase_deal::{PaddyPurchaseDeal, PurchaseType, UpsertPaddyPurchaseDeal},
    reference_entry::BulkDeleteRequest,
};
use serde_json::Value;
use services::services::{derived_fields::FormState, forms};
use utils::{
    pagination::{ListQuery, Paginated},
    response::ApiResponse,
};
use uuid::Uuid;

use super::reference_entries::BulkDeleteResult;
use crate::{AppState, error::ApiError};

/// Run the submitted body through the deal form: hidden DO fields are dropped,
/// `total` is recomputed from the quantities, then every visible field is validated.
fn prepare_deal(body: Value) -> Result<UpsertPaddyPurchaseDeal, ApiError> {
    let form = forms::paddy_purchase_deal().submit(FormState::from_value(body))?;
    deal_from_form(&form)
}

fn deal_from_form(form: &FormState) -> Result<UpsertPaddyPurchaseDeal, ApiError> {
    let text = |field: &str| {
        form.text(field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let deal_date = form
        .text("dealDate")
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| ApiError::BadRequest("dealDate must be a date (YYYY-MM-DD)".to_string()))?;
    let purchase_type = match form.text("purchaseType") {
        Some(raw) => PurchaseType::from_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("Unknown purchase type '{raw}'")))?,
        None => PurchaseType::default(),
    };

    Ok(UpsertPaddyPurchaseDeal {
        deal_date,
        party_name: text("partyName").unwrap_or_default(),
        broker_name: text("brokerName"),
        purchase_type,
        do_number: text("doNumber"),
        committee_name: text("committeeName"),
        dhan_mota: form.number("dhanMota").unwrap_or_default(),
        dhan_patla: form.number("dhanPatla").unwrap_or_default(),
        dhan_sarna: form.number("dhanSarna").unwrap_or_default(),
        total: form.number("total").unwrap_or_default(),
        rate: form.number("rate"),
    })
}

/// GET /api/mills/{mill_id}/paddy-purchase-deals
pub async fn list_deals(
    State(state): State<AppState>,
    Path(mill_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<Paginated<PaddyPurchaseDeal>>, ApiError> {
    let page = PaddyPurchaseDeal::list(&state.db().pool, &mill_id, &query).await?;
    Ok(ResponseJson(page))
}

/// GET /api/mills/{mill_id}/paddy-purchase-deals/{id}
pub async fn get_deal(
    State(state): State<AppState>,
    Path((mill_id, id)): Path<(String, Uuid)>,
) -> Result<ResponseJson<ApiResponse<PaddyPurchaseDeal>>, ApiError> {
    let deal = PaddyPurchaseDeal::find_by_id(&state.db().pool, &mill_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Deal {id}")))?;
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// POST /api/mills/{mill_id}/paddy-purchase-deals
pub async fn create_deal(
    State(state): State<AppState>,
    Path(mill_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<PaddyPurchaseDeal>>), ApiError> {
    let data = prepare_deal(body)?;
    let deal = PaddyPurchaseDeal::create(&state.db().pool, &mill_id, &data).await?;
    tracing::info!(mill_id = %mill_id, deal_id = %deal.id, total = deal.total, "Created paddy purchase deal");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(deal))))
}

/// PUT /api/mills/{mill_id}/paddy-purchase-deals/{id}
pub async fn update_deal(
    State(state): State<AppState>,
    Path((mill_id, id)): Path<(String, Uuid)>,
    axum::Json(body): axum::Json<Value>,
) -> Result<ResponseJson<ApiResponse<PaddyPurchaseDeal>>, ApiError> {
    let data = prepare_deal(body)?;
    let deal = PaddyPurchaseDeal::update(&state.db().pool, &mill_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Deal {id}")))?;
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// DELETE /api/mills/{mill_id}/paddy-purchase-deals/{id}
pub async fn delete_deal(
    State(state): State<AppState>,
    Path((mill_id, id)): Path<(String, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = PaddyPurchaseDeal::delete(&state.db().pool, &mill_id, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("Deal {id}")));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/mills/{mill_id}/paddy-purchase-deals/bulk-delete
pub async fn bulk_delete_deals(
    State(state): State<AppState>,
    Path(mill_id): Path<String>,
    axum::Json(payload): axum::Json<BulkDeleteRequest>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteResult>>, ApiError> {
    if payload.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }
    let deleted = PaddyPurchaseDeal::bulk_delete(&state.db().pool, &mill_id, &payload.ids).await?;
    Ok(ResponseJson(ApiResponse::success(BulkDeleteResult { deleted })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/mills/{mill_id}/paddy-purchase-deals",
        Router::new()
            .route("/", get(list_deals).post(create_deal))
            .route("/bulk-delete", post(bulk_delete_deals))
            .route("/{id}", put(update_deal).get(get_deal).delete(delete_deal)),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn market_deal_body_becomes_upsert_with_total() {
        let data = prepare_deal(json!({
            "dealDate": "2026-03-01",
            "partyName": "  Acme Traders ",
            "purchaseType": "market",
            "doNumber": "DO-stale",
            "dhanMota": "12.5",
            "dhanPatla": 7,
            "total": 999,
            "rate": "2100",
        }))
        .unwrap();

        assert_eq!(data.party_name, "Acme Traders");
        assert_eq!(data.purchase_type, PurchaseType::Market);
        assert_eq!(data.do_number, None);
        assert_eq!(data.total, 19.5);
        assert_eq!(data.dhan_sarna, 0.0);
        assert_eq!(data.rate, Some(2100.0));
    }

    #[test]
    fn do_deal_without_committee_is_a_validation_error() {
        let err = prepare_deal(json!({
            "dealDate": "2026-03-01",
            "partyName": "Acme Traders",
            "purchaseType": "do",
            "doNumber": "DO-7",
        }))
        .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("committeeName"), Some("is required"));
                assert_eq!(errors.fields.len(), 1);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
