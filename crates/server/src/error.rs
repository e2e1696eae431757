use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::form_schema::ValidationErrors;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                let body = ApiResponse::<()>::error("Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ApiError::Validation(errors) => {
                let message = format!("Validation failed: {errors}");
                let body = ApiResponse::<BTreeMap<String, String>> {
                    success: false,
                    data: Some(errors.fields),
                    message: Some(message),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::NotFound(_) => {
                let body = ApiResponse::<()>::error(self.to_string());
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            ApiError::BadRequest(message) => {
                let body = ApiResponse::<()>::error(message);
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
        }
    }
}
