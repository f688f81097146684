use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// A city served by couriers, tied to the weather station that covers it.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // id populated by FromRow; lookups are keyed by it
pub struct City {
    pub id: Uuid,
    pub name: String,
    /// WMO code of the observing station.
    pub wmo_code: i32,
}

/// A single observation from a weather station.
///
/// Any of the measured values may be missing when the station did not report
/// them; missing values never produce a weather code.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some only read in logs
pub struct WeatherMeasurement {
    pub id: Uuid,
    pub wmo_code: i32,
    pub station_name: String,
    pub observed_at: DateTime<Utc>,
    /// Air temperature in Celsius
    pub air_temperature: Option<Decimal>,
    /// Wind speed in metres per second
    pub wind_speed: Option<Decimal>,
    /// Free-text phenomenon as reported by the station (e.g. "Light snow shower")
    pub phenomenon: Option<String>,
}
