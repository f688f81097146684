use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::fee::FeeError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Machine-readable reason for fee calculation failures
    /// (e.g. "UNFIT_WEATHER_CONDITIONS")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Fee calculation failed: {0}")]
    Fee(#[from] FeeError),
}

impl FeeError {
    /// HTTP status and reason code for a fee calculation failure.
    fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            FeeError::InvalidVehicleId(_) => (StatusCode::NOT_FOUND, "INVALID_VEHICLE_ID"),
            FeeError::InvalidCityId(_) => (StatusCode::NOT_FOUND, "INVALID_CITY_ID"),
            FeeError::WeatherDataUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "WEATHER_DATA_UNAVAILABLE")
            }
            FeeError::UnfitWeatherConditions { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNFIT_WEATHER_CONDITIONS")
            }
            FeeError::BaseFeeNotConfigured { .. } => {
                (StatusCode::NOT_FOUND, "BASE_FEE_NOT_CONFIGURED")
            }
            FeeError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, reason) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Fee(FeeError::Database(err)) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                    None,
                )
            }
            AppError::Fee(err) => {
                let (status, reason) = err.status_and_reason();
                (status, err.to_string(), Some(reason.to_string()))
            }
        };

        (
            status,
            axum::Json(ErrorResponse {
                error: message,
                reason,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Fee(FeeError::Database(err))
    }
}
