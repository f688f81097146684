use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{City, WeatherMeasurement};

/// Check whether a vehicle with the given ID exists.
pub async fn vehicle_exists(pool: &PgPool, vehicle_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1)")
        .bind(vehicle_id)
        .fetch_one(pool)
        .await
}

/// Get a single city by ID.
pub async fn get_city(pool: &PgPool, city_id: Uuid) -> Result<Option<City>, sqlx::Error> {
    sqlx::query_as::<_, City>("SELECT id, name, wmo_code FROM cities WHERE id = $1")
        .bind(city_id)
        .fetch_optional(pool)
        .await
}

/// Get the most recent measurement reported by a station.
pub async fn get_latest_measurement(
    pool: &PgPool,
    wmo_code: i32,
) -> Result<Option<WeatherMeasurement>, sqlx::Error> {
    sqlx::query_as::<_, WeatherMeasurement>(
        "SELECT id, wmo_code, station_name, observed_at,
                air_temperature, wind_speed, phenomenon
         FROM weather_measurements
         WHERE wmo_code = $1
         ORDER BY observed_at DESC, created_at DESC
         LIMIT 1",
    )
    .bind(wmo_code)
    .fetch_optional(pool)
    .await
}

/// Get the regional base fee for a city/vehicle combination.
pub async fn get_base_fee(
    pool: &PgPool,
    city_id: Uuid,
    vehicle_id: Uuid,
) -> Result<Option<Decimal>, sqlx::Error> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT fee_amount FROM regional_base_fees
         WHERE city_id = $1 AND vehicle_id = $2",
    )
    .bind(city_id)
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await
}

/// Get the weather surcharge for a vehicle under a given code item.
pub async fn get_extra_fee(
    pool: &PgPool,
    vehicle_id: Uuid,
    code_item_id: Uuid,
) -> Result<Option<Decimal>, sqlx::Error> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT fee_amount FROM extra_fees
         WHERE vehicle_id = $1 AND code_item_id = $2",
    )
    .bind(vehicle_id)
    .bind(code_item_id)
    .fetch_optional(pool)
    .await
}

/// Whether a vehicle is prohibited under a given code item.
pub async fn prohibition_exists(
    pool: &PgPool,
    vehicle_id: Uuid,
    code_item_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM work_prohibitions
             WHERE vehicle_id = $1 AND code_item_id = $2
         )",
    )
    .bind(vehicle_id)
    .bind(code_item_id)
    .fetch_one(pool)
    .await
}

/// Look up the code item ID for a weather code key (e.g. "WP_RAIN").
pub async fn find_code_item_id(pool: &PgPool, code: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM code_items WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

/// Number of configured vehicle types (used by the health check).
pub async fn count_vehicles(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vehicles")
        .fetch_one(pool)
        .await
}
