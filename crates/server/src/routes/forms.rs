use std::collections::BTreeMap;

use axum::{Router, extract::Path, response::Json as ResponseJson, routing::post};
use serde::Serialize;
use serde_json::Value;
use services::services::{
    derived_fields::FormState,
    forms::{self, FormDefinition},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Form values after derivation, with what the client should render and flag.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormEvaluation {
    pub values: Value,
    pub visible_fields: Vec<String>,
    /// Derived targets whose value changed.
    pub derived_fields: Vec<String>,
    pub errors: BTreeMap<String, String>,
}

fn evaluate(definition: &FormDefinition, mut form: FormState) -> FormEvaluation {
    let derived_fields = definition.calculator.recompute_all(&mut form);
    let visible_fields = definition
        .schema
        .visible_fields(&form)
        .into_iter()
        .map(str::to_string)
        .collect();
    let errors = definition
        .schema
        .validate(&form)
        .err()
        .map(|e| e.fields)
        .unwrap_or_default();

    FormEvaluation {
        values: form.into_value(),
        visible_fields,
        derived_fields,
        errors,
    }
}

/// POST /api/forms/{form_name}/evaluate
///
/// Recompute derived fields for a draft and report visibility and validation
/// without storing anything.
pub async fn evaluate_form(
    Path(form_name): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Result<ResponseJson<ApiResponse<FormEvaluation>>, ApiError> {
    let definition = forms::by_name(&form_name)
        .ok_or_else(|| ApiError::NotFound(format!("Form '{form_name}'")))?;
    let evaluation = evaluate(&definition, FormState::from_value(body));
    tracing::debug!(form = definition.name, derived = ?evaluation.derived_fields, "Evaluated form draft");
    Ok(ResponseJson(ApiResponse::success(evaluation)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/forms/{form_name}/evaluate", post(evaluate_form))
}
