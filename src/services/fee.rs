//! Delivery fee calculation.
//!
//! Combines the regional base fee for a city/vehicle pair with weather
//! surcharges, after checking that current weather does not forbid the
//! vehicle. Weather is taken from the latest measurement of the city's station.
//!
//! Weather codes without a configured code item are not errors: they are
//! skipped, logged, and reported back as warnings on the result.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::store::FeeStore;
use crate::services::weather_code::{classify, WeatherCode};

/// Errors that abort a fee calculation.
#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    #[error("Invalid vehicle ID: {0}")]
    InvalidVehicleId(Uuid),

    #[error("Invalid city ID: {0}")]
    InvalidCityId(Uuid),

    #[error("No weather measurement available for station {wmo_code}")]
    WeatherDataUnavailable { wmo_code: i32 },

    #[error("Usage of selected vehicle type is forbidden ({code})")]
    UnfitWeatherConditions { code: WeatherCode },

    #[error("No base fee configured for city {city_id} and vehicle {vehicle_id}")]
    BaseFeeNotConfigured { city_id: Uuid, vehicle_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Non-fatal condition encountered while calculating a fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeWarning {
    /// A derived weather code has no code item, so it was ignored for both
    /// prohibitions and surcharges.
    CodeItemNotConfigured { code: WeatherCode },
}

/// Outcome of mapping one weather code to its code item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeResolution {
    Configured { code: WeatherCode, code_item_id: Uuid },
    NotConfigured { code: WeatherCode },
}

/// A successfully calculated delivery fee.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFee {
    pub city_id: Uuid,
    pub vehicle_id: Uuid,
    pub base_fee: Decimal,
    /// Sum of all applicable weather surcharges
    pub extra_fee: Decimal,
    pub total_fee: Decimal,
    /// Codes derived from the measurement, in axis order
    pub weather_codes: Vec<WeatherCode>,
    /// Observation time of the measurement the fee is based on
    pub measured_at: DateTime<Utc>,
    pub warnings: Vec<FeeWarning>,
}

/// Calculate the delivery fee for a vehicle in a city under current weather.
pub async fn compute_fee<S: FeeStore + ?Sized>(
    store: &S,
    city_id: Uuid,
    vehicle_id: Uuid,
) -> Result<DeliveryFee, FeeError> {
    if !store.vehicle_exists(vehicle_id).await? {
        return Err(FeeError::InvalidVehicleId(vehicle_id));
    }

    let city = store
        .get_city(city_id)
        .await?
        .ok_or(FeeError::InvalidCityId(city_id))?;

    let measurement = store
        .get_latest_measurement(city.wmo_code)
        .await?
        .ok_or(FeeError::WeatherDataUnavailable {
            wmo_code: city.wmo_code,
        })?;

    let weather_codes = classify(&measurement);
    tracing::debug!(
        "Station {} at {}: weather codes {:?}",
        measurement.station_name,
        measurement.observed_at,
        weather_codes
    );

    let resolutions = resolve_codes(store, &weather_codes).await?;

    let mut warnings = Vec::new();
    let mut configured = Vec::with_capacity(resolutions.len());
    for resolution in resolutions {
        match resolution {
            CodeResolution::Configured { code, code_item_id } => {
                configured.push((code, code_item_id));
            }
            CodeResolution::NotConfigured { code } => {
                tracing::warn!("Code item does not exist. Code: {}", code);
                warnings.push(FeeWarning::CodeItemNotConfigured { code });
            }
        }
    }

    for &(code, code_item_id) in &configured {
        if store.get_prohibition(vehicle_id, code_item_id).await? {
            tracing::info!(
                "Vehicle {} forbidden in city {} due to {}",
                vehicle_id,
                city.name,
                code
            );
            return Err(FeeError::UnfitWeatherConditions { code });
        }
    }

    let base_fee = store
        .get_base_fee(city_id, vehicle_id)
        .await?
        .ok_or(FeeError::BaseFeeNotConfigured {
            city_id,
            vehicle_id,
        })?;

    let mut extra_fee = Decimal::ZERO;
    for &(_, code_item_id) in &configured {
        if let Some(amount) = store.get_extra_fee(vehicle_id, code_item_id).await? {
            extra_fee += amount;
        }
    }

    Ok(DeliveryFee {
        city_id,
        vehicle_id,
        base_fee,
        extra_fee,
        total_fee: base_fee + extra_fee,
        weather_codes,
        measured_at: measurement.observed_at,
        warnings,
    })
}

/// Map each weather code to its code item, keeping unmapped codes as
/// `NotConfigured` instead of failing.
async fn resolve_codes<S: FeeStore + ?Sized>(
    store: &S,
    codes: &[WeatherCode],
) -> Result<Vec<CodeResolution>, sqlx::Error> {
    let mut resolutions = Vec::with_capacity(codes.len());
    for &code in codes {
        let resolution = match store.resolve_code_item(code).await? {
            Some(code_item_id) => CodeResolution::Configured { code, code_item_id },
            None => CodeResolution::NotConfigured { code },
        };
        resolutions.push(resolution);
    }
    Ok(resolutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{City, WeatherMeasurement};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TALLINN_WMO: i32 = 26038;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// In-memory tables standing in for the database.
    #[derive(Default)]
    struct InMemoryStore {
        vehicles: HashSet<Uuid>,
        cities: HashMap<Uuid, City>,
        measurements: HashMap<i32, WeatherMeasurement>,
        base_fees: HashMap<(Uuid, Uuid), Decimal>,
        extra_fees: HashMap<(Uuid, Uuid), Decimal>,
        prohibitions: HashSet<(Uuid, Uuid)>,
        code_items: HashMap<WeatherCode, Uuid>,
        /// Number of lookups made after the vehicle check
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl FeeStore for InMemoryStore {
        async fn vehicle_exists(&self, vehicle_id: Uuid) -> Result<bool, sqlx::Error> {
            Ok(self.vehicles.contains(&vehicle_id))
        }

        async fn get_city(&self, city_id: Uuid) -> Result<Option<City>, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.cities.get(&city_id).cloned())
        }

        async fn get_latest_measurement(
            &self,
            wmo_code: i32,
        ) -> Result<Option<WeatherMeasurement>, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.measurements.get(&wmo_code).cloned())
        }

        async fn get_base_fee(
            &self,
            city_id: Uuid,
            vehicle_id: Uuid,
        ) -> Result<Option<Decimal>, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.base_fees.get(&(city_id, vehicle_id)).copied())
        }

        async fn get_extra_fee(
            &self,
            vehicle_id: Uuid,
            code_item_id: Uuid,
        ) -> Result<Option<Decimal>, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.extra_fees.get(&(vehicle_id, code_item_id)).copied())
        }

        async fn get_prohibition(
            &self,
            vehicle_id: Uuid,
            code_item_id: Uuid,
        ) -> Result<bool, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.prohibitions.contains(&(vehicle_id, code_item_id)))
        }

        async fn resolve_code_item(
            &self,
            code: WeatherCode,
        ) -> Result<Option<Uuid>, sqlx::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.code_items.get(&code).copied())
        }
    }

    /// Store that fails every lookup, to check error propagation.
    struct BrokenStore;

    #[async_trait]
    impl FeeStore for BrokenStore {
        async fn vehicle_exists(&self, _vehicle_id: Uuid) -> Result<bool, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn get_city(&self, _city_id: Uuid) -> Result<Option<City>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn get_latest_measurement(
            &self,
            _wmo_code: i32,
        ) -> Result<Option<WeatherMeasurement>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn get_base_fee(
            &self,
            _city_id: Uuid,
            _vehicle_id: Uuid,
        ) -> Result<Option<Decimal>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn get_extra_fee(
            &self,
            _vehicle_id: Uuid,
            _code_item_id: Uuid,
        ) -> Result<Option<Decimal>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn get_prohibition(
            &self,
            _vehicle_id: Uuid,
            _code_item_id: Uuid,
        ) -> Result<bool, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn resolve_code_item(
            &self,
            _code: WeatherCode,
        ) -> Result<Option<Uuid>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }
    }

    struct Fixture {
        store: InMemoryStore,
        city_id: Uuid,
        bike_id: Uuid,
        car_id: Uuid,
    }

    /// Tallinn with a bike and a car, every weather code mapped, and a
    /// base fee of 3.00 for the bike and 4.00 for the car.
    fn fixture() -> Fixture {
        let city_id = Uuid::new_v4();
        let bike_id = Uuid::new_v4();
        let car_id = Uuid::new_v4();

        let mut store = InMemoryStore::default();
        store.vehicles.insert(bike_id);
        store.vehicles.insert(car_id);
        store.cities.insert(
            city_id,
            City {
                id: city_id,
                name: "Tallinn".to_string(),
                wmo_code: TALLINN_WMO,
            },
        );
        for code in [
            WeatherCode::AtUnderMinusTen,
            WeatherCode::AtMinusTenToZero,
            WeatherCode::WsTenToTwenty,
            WeatherCode::WsAboveTwenty,
            WeatherCode::WpRain,
            WeatherCode::WpSnowSleet,
            WeatherCode::WpGlazeHailThunder,
        ] {
            store.code_items.insert(code, Uuid::new_v4());
        }
        store.base_fees.insert((city_id, bike_id), dec("3.00"));
        store.base_fees.insert((city_id, car_id), dec("4.00"));

        Fixture {
            store,
            city_id,
            bike_id,
            car_id,
        }
    }

    impl Fixture {
        fn set_weather(
            &mut self,
            air_temperature: Option<&str>,
            wind_speed: Option<&str>,
            phenomenon: Option<&str>,
        ) {
            self.store.measurements.insert(
                TALLINN_WMO,
                WeatherMeasurement {
                    id: Uuid::new_v4(),
                    wmo_code: TALLINN_WMO,
                    station_name: "Tallinn-Harku".to_string(),
                    observed_at: DateTime::parse_from_rfc3339("2024-03-01T12:15:00Z")
                        .unwrap()
                        .with_timezone(&Utc),
                    air_temperature: air_temperature.map(dec),
                    wind_speed: wind_speed.map(dec),
                    phenomenon: phenomenon.map(str::to_string),
                },
            );
        }

        fn add_extra_fee(&mut self, vehicle_id: Uuid, code: WeatherCode, amount: &str) {
            let item = self.store.code_items[&code];
            self.store.extra_fees.insert((vehicle_id, item), dec(amount));
        }

        fn add_prohibition(&mut self, vehicle_id: Uuid, code: WeatherCode) {
            let item = self.store.code_items[&code];
            self.store.prohibitions.insert((vehicle_id, item));
        }
    }

    #[tokio::test]
    async fn test_cold_weather_surcharge_added_to_base_fee() {
        let mut f = fixture();
        f.set_weather(Some("-15"), Some("5"), None);
        f.add_extra_fee(f.bike_id, WeatherCode::AtUnderMinusTen, "1.00");

        let fee = compute_fee(&f.store, f.city_id, f.bike_id).await.unwrap();

        assert_eq!(fee.weather_codes, vec![WeatherCode::AtUnderMinusTen]);
        assert_eq!(fee.base_fee, dec("3.00"));
        assert_eq!(fee.extra_fee, dec("1.00"));
        assert_eq!(fee.total_fee, dec("4.00"));
        assert!(fee.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_cold_weather_prohibition() {
        let mut f = fixture();
        f.set_weather(Some("-15"), Some("5"), None);
        f.add_extra_fee(f.bike_id, WeatherCode::AtUnderMinusTen, "1.00");
        f.add_prohibition(f.bike_id, WeatherCode::AtUnderMinusTen);

        let err = compute_fee(&f.store, f.city_id, f.bike_id)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FeeError::UnfitWeatherConditions {
                code: WeatherCode::AtUnderMinusTen
            }
        ));
    }

    #[tokio::test]
    async fn test_prohibition_is_per_vehicle() {
        let mut f = fixture();
        f.set_weather(Some("5"), Some("25"), None);
        f.add_prohibition(f.bike_id, WeatherCode::WsAboveTwenty);

        let fee = compute_fee(&f.store, f.city_id, f.car_id).await.unwrap();
        assert_eq!(fee.total_fee, dec("4.00"));

        let err = compute_fee(&f.store, f.city_id, f.bike_id)
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::UnfitWeatherConditions { .. }));
    }

    #[tokio::test]
    async fn test_prohibition_checked_before_base_fee() {
        // No base fee for the bike, but the prohibition must win
        let mut f = fixture();
        f.set_weather(None, None, Some("Thunderstorm"));
        f.store.base_fees.clear();
        f.add_prohibition(f.bike_id, WeatherCode::WpGlazeHailThunder);

        let err = compute_fee(&f.store, f.city_id, f.bike_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FeeError::UnfitWeatherConditions {
                code: WeatherCode::WpGlazeHailThunder
            }
        ));
    }

    #[tokio::test]
    async fn test_surcharges_from_every_axis_are_summed() {
        let mut f = fixture();
        f.set_weather(Some("-2.1"), Some("14.0"), Some("Light snow shower"));
        f.add_extra_fee(f.bike_id, WeatherCode::AtMinusTenToZero, "0.50");
        f.add_extra_fee(f.bike_id, WeatherCode::WsTenToTwenty, "0.50");
        f.add_extra_fee(f.bike_id, WeatherCode::WpSnowSleet, "1.00");

        let fee = compute_fee(&f.store, f.city_id, f.bike_id).await.unwrap();

        assert_eq!(fee.weather_codes.len(), 3);
        assert_eq!(fee.extra_fee, dec("2.00"));
        assert_eq!(fee.total_fee, dec("5.00"));
    }

    #[tokio::test]
    async fn test_codes_without_extra_fee_contribute_zero() {
        let mut f = fixture();
        f.set_weather(Some("-2.1"), None, Some("Light rain"));
        f.add_extra_fee(f.car_id, WeatherCode::WpRain, "0.25");

        let fee = compute_fee(&f.store, f.city_id, f.car_id).await.unwrap();

        assert_eq!(
            fee.weather_codes,
            vec![WeatherCode::AtMinusTenToZero, WeatherCode::WpRain]
        );
        assert_eq!(fee.extra_fee, dec("0.25"));
        assert_eq!(fee.total_fee, dec("4.25"));
    }

    #[tokio::test]
    async fn test_mild_weather_only_base_fee() {
        let mut f = fixture();
        f.set_weather(Some("12.4"), Some("3.1"), Some("Clear"));

        let fee = compute_fee(&f.store, f.city_id, f.bike_id).await.unwrap();

        assert!(fee.weather_codes.is_empty());
        assert_eq!(fee.extra_fee, Decimal::ZERO);
        assert_eq!(fee.total_fee, dec("3.00"));
    }

    #[tokio::test]
    async fn test_unmapped_code_is_skipped_with_warning() {
        let mut f = fixture();
        f.set_weather(Some("-15"), Some("25"), None);
        f.add_extra_fee(f.bike_id, WeatherCode::AtUnderMinusTen, "1.00");
        f.add_prohibition(f.bike_id, WeatherCode::WsAboveTwenty);
        f.store.code_items.remove(&WeatherCode::WsAboveTwenty);

        let fee = compute_fee(&f.store, f.city_id, f.bike_id).await.unwrap();

        // The wind prohibition cannot be resolved, so it does not apply
        assert_eq!(fee.total_fee, dec("4.00"));
        assert_eq!(
            fee.warnings,
            vec![FeeWarning::CodeItemNotConfigured {
                code: WeatherCode::WsAboveTwenty
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_vehicle_fails_before_other_lookups() {
        let mut f = fixture();
        f.set_weather(Some("-15"), None, None);
        let unknown = Uuid::new_v4();

        let err = compute_fee(&f.store, Uuid::new_v4(), unknown)
            .await
            .unwrap_err();

        assert!(matches!(err, FeeError::InvalidVehicleId(id) if id == unknown));
        assert_eq!(f.store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_city() {
        let mut f = fixture();
        f.set_weather(Some("-15"), None, None);
        let unknown = Uuid::new_v4();

        let err = compute_fee(&f.store, unknown, f.bike_id)
            .await
            .unwrap_err();

        assert!(matches!(err, FeeError::InvalidCityId(id) if id == unknown));
    }

    #[tokio::test]
    async fn test_missing_base_fee_never_returns_partial_amount() {
        let mut f = fixture();
        f.set_weather(Some("-15"), None, None);
        f.add_extra_fee(f.bike_id, WeatherCode::AtUnderMinusTen, "1.00");
        f.store.base_fees.remove(&(f.city_id, f.bike_id));

        let err = compute_fee(&f.store, f.city_id, f.bike_id)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FeeError::BaseFeeNotConfigured { city_id, vehicle_id }
                if city_id == f.city_id && vehicle_id == f.bike_id
        ));
    }

    #[tokio::test]
    async fn test_station_without_measurements() {
        let f = fixture();

        let err = compute_fee(&f.store, f.city_id, f.car_id)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FeeError::WeatherDataUnavailable {
                wmo_code: TALLINN_WMO
            }
        ));
    }

    #[tokio::test]
    async fn test_database_errors_propagate() {
        let err = compute_fee(&BrokenStore, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::Database(_)));
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let mut f = fixture();
        f.set_weather(None, None, None);
        let store: &dyn FeeStore = &f.store;

        let fee = compute_fee(store, f.city_id, f.car_id).await.unwrap();
        assert_eq!(fee.total_fee, dec("4.00"));
        assert_eq!(fee.measured_at.to_rfc3339(), "2024-03-01T12:15:00+00:00");
    }
}
