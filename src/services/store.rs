//! Lookup interface consumed by the fee calculator.
//!
//! `FeeStore` abstracts the keyed reads the calculator needs so the decision
//! logic can run against Postgres in production and an in-memory table in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{City, WeatherMeasurement};
use crate::db::queries;
use crate::services::weather_code::WeatherCode;

/// Read-only access to vehicles, cities, weather and the fee tables.
#[async_trait]
pub trait FeeStore: Send + Sync {
    async fn vehicle_exists(&self, vehicle_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn get_city(&self, city_id: Uuid) -> Result<Option<City>, sqlx::Error>;

    /// Most recent measurement for the station, if it ever reported one.
    async fn get_latest_measurement(
        &self,
        wmo_code: i32,
    ) -> Result<Option<WeatherMeasurement>, sqlx::Error>;

    async fn get_base_fee(
        &self,
        city_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Option<Decimal>, sqlx::Error>;

    async fn get_extra_fee(
        &self,
        vehicle_id: Uuid,
        code_item_id: Uuid,
    ) -> Result<Option<Decimal>, sqlx::Error>;

    /// Whether a prohibition row exists for the vehicle under this code item.
    async fn get_prohibition(
        &self,
        vehicle_id: Uuid,
        code_item_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    /// Map a weather code to the code item ID used by the fee tables.
    async fn resolve_code_item(&self, code: WeatherCode) -> Result<Option<Uuid>, sqlx::Error>;
}

/// `FeeStore` backed by the Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgFeeStore {
    pool: PgPool,
}

impl PgFeeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeeStore for PgFeeStore {
    async fn vehicle_exists(&self, vehicle_id: Uuid) -> Result<bool, sqlx::Error> {
        queries::vehicle_exists(&self.pool, vehicle_id).await
    }

    async fn get_city(&self, city_id: Uuid) -> Result<Option<City>, sqlx::Error> {
        queries::get_city(&self.pool, city_id).await
    }

    async fn get_latest_measurement(
        &self,
        wmo_code: i32,
    ) -> Result<Option<WeatherMeasurement>, sqlx::Error> {
        queries::get_latest_measurement(&self.pool, wmo_code).await
    }

    async fn get_base_fee(
        &self,
        city_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        queries::get_base_fee(&self.pool, city_id, vehicle_id).await
    }

    async fn get_extra_fee(
        &self,
        vehicle_id: Uuid,
        code_item_id: Uuid,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        queries::get_extra_fee(&self.pool, vehicle_id, code_item_id).await
    }

    async fn get_prohibition(
        &self,
        vehicle_id: Uuid,
        code_item_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        queries::prohibition_exists(&self.pool, vehicle_id, code_item_id).await
    }

    async fn resolve_code_item(&self, code: WeatherCode) -> Result<Option<Uuid>, sqlx::Error> {
        queries::find_code_item_id(&self.pool, code.as_str()).await
    }
}
