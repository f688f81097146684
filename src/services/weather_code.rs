//! Weather classification.
//!
//! Turns a station measurement into the weather codes that drive surcharges
//! and prohibitions. Each axis (air temperature, wind speed, phenomenon) is
//! classified independently and yields at most one code, so a measurement
//! produces between zero and three codes.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

use crate::db::models::WeatherMeasurement;

/// Classification bucket derived from a weather measurement.
///
/// The string form (`as_str`) is the key stored in the `code_items` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCode {
    /// Air temperature below -10 °C
    AtUnderMinusTen,
    /// Air temperature between -10 °C and 0 °C (inclusive)
    AtMinusTenToZero,
    /// Wind speed between 10 m/s and 20 m/s (inclusive)
    WsTenToTwenty,
    /// Wind speed above 20 m/s
    WsAboveTwenty,
    /// Any kind of rain
    WpRain,
    /// Snow or sleet
    WpSnowSleet,
    /// Glaze, hail or thunder
    WpGlazeHailThunder,
}

impl WeatherCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCode::AtUnderMinusTen => "AT_UNDER_MINUS_TEN",
            WeatherCode::AtMinusTenToZero => "AT_MINUS_TEN_TO_ZERO",
            WeatherCode::WsTenToTwenty => "WS_TEN_TO_TWENTY",
            WeatherCode::WsAboveTwenty => "WS_ABOVE_TWENTY",
            WeatherCode::WpRain => "WP_RAIN",
            WeatherCode::WpSnowSleet => "WP_SNOW_SLEET",
            WeatherCode::WpGlazeHailThunder => "WP_GLAZE_HAIL_THUNDER",
        }
    }
}

impl fmt::Display for WeatherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify air temperature (°C).
///
/// `< -10` → under minus ten, `[-10, 0]` → minus ten to zero, above zero → none.
pub fn air_temperature_code(temperature_c: Option<Decimal>) -> Option<WeatherCode> {
    let t = temperature_c?;
    let minus_ten = Decimal::from(-10);

    if t < minus_ten {
        Some(WeatherCode::AtUnderMinusTen)
    } else if t <= Decimal::ZERO {
        Some(WeatherCode::AtMinusTenToZero)
    } else {
        None
    }
}

/// Classify wind speed (m/s).
///
/// `[10, 20]` → ten to twenty, `> 20` → above twenty, below ten → none.
pub fn wind_speed_code(wind_speed_ms: Option<Decimal>) -> Option<WeatherCode> {
    let w = wind_speed_ms?;
    let ten = Decimal::from(10);
    let twenty = Decimal::from(20);

    if w > twenty {
        Some(WeatherCode::WsAboveTwenty)
    } else if w >= ten {
        Some(WeatherCode::WsTenToTwenty)
    } else {
        None
    }
}

/// Classify the free-text phenomenon reported by the station.
///
/// Case-insensitive substring match; rain wins over snow/sleet, which wins
/// over glaze/hail/thunder.
pub fn phenomenon_code(phenomenon: Option<&str>) -> Option<WeatherCode> {
    let text = phenomenon?.to_lowercase();

    if text.contains("rain") {
        Some(WeatherCode::WpRain)
    } else if text.contains("snow") || text.contains("sleet") {
        Some(WeatherCode::WpSnowSleet)
    } else if text.contains("glaze") || text.contains("hail") || text.contains("thunder") {
        Some(WeatherCode::WpGlazeHailThunder)
    } else {
        None
    }
}

/// Derive all weather codes for a measurement, in axis order:
/// temperature, wind, phenomenon.
pub fn classify(measurement: &WeatherMeasurement) -> Vec<WeatherCode> {
    [
        air_temperature_code(measurement.air_temperature),
        wind_speed_code(measurement.wind_speed),
        phenomenon_code(measurement.phenomenon.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect()
}
