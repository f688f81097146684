//! Delivery fee HTTP endpoint.
//!
//! - GET /api/v1/delivery-fee?city_id=UUID&vehicle_id=UUID

use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::{AppError, ErrorResponse};
use crate::services::fee::{compute_fee, DeliveryFee, FeeWarning};
use crate::services::store::PgFeeStore;
use crate::services::weather_code::WeatherCode;

/// Shared application state for the fee endpoint.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: PgFeeStore,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeliveryFeeQuery {
    /// City UUID
    pub city_id: String,
    /// Vehicle UUID
    pub vehicle_id: String,
}

/// Delivery fee for a city/vehicle pair under current weather.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryFeeResponse {
    /// City UUID
    pub city_id: Uuid,
    /// Vehicle UUID
    pub vehicle_id: Uuid,
    /// Regional base fee (decimal string, EUR)
    #[schema(value_type = String, example = "3.00")]
    pub base_fee: Decimal,
    /// Sum of weather surcharges (decimal string, EUR)
    #[schema(value_type = String, example = "1.00")]
    pub extra_fee: Decimal,
    /// Base fee plus surcharges (decimal string, EUR)
    #[schema(value_type = String, example = "4.00")]
    pub total_fee: Decimal,
    /// Weather codes derived from the latest station measurement
    pub weather_codes: Vec<WeatherCode>,
    /// Observation time of that measurement (ISO 8601)
    pub measured_at: String,
    /// Non-fatal issues, e.g. weather codes missing from the code item table
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FeeWarning>,
}

impl From<DeliveryFee> for DeliveryFeeResponse {
    fn from(fee: DeliveryFee) -> Self {
        Self {
            city_id: fee.city_id,
            vehicle_id: fee.vehicle_id,
            base_fee: fee.base_fee,
            extra_fee: fee.extra_fee,
            total_fee: fee.total_fee,
            weather_codes: fee.weather_codes,
            measured_at: fee.measured_at.to_rfc3339(),
            warnings: fee.warnings,
        }
    }
}

fn parse_id(field: &str, value: &str) -> Result<Uuid, AppError> {
    value
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", field, e)))
}

/// Calculate the delivery fee for a vehicle in a city.
///
/// Uses the most recent measurement from the city's weather station. Fails
/// when the vehicle is forbidden under current conditions.
#[utoipa::path(
    get,
    path = "/api/v1/delivery-fee",
    tag = "Delivery fee",
    params(DeliveryFeeQuery),
    responses(
        (status = 200, description = "Calculated delivery fee", body = DeliveryFeeResponse),
        (status = 400, description = "Malformed city or vehicle ID", body = ErrorResponse),
        (status = 404, description = "Unknown city or vehicle, or no base fee configured", body = ErrorResponse),
        (status = 422, description = "Vehicle type forbidden under current weather", body = ErrorResponse),
        (status = 503, description = "No weather measurement for the city's station", body = ErrorResponse),
    )
)]
pub async fn get_delivery_fee(
    State(state): State<AppState>,
    Query(params): Query<DeliveryFeeQuery>,
) -> Result<Json<DeliveryFeeResponse>, AppError> {
    let city_id = parse_id("city_id", &params.city_id)?;
    let vehicle_id = parse_id("vehicle_id", &params.vehicle_id)?;

    let fee = compute_fee(&state.store, city_id, vehicle_id).await?;
    Ok(Json(DeliveryFeeResponse::from(fee)))
}
