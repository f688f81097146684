pub mod fee;
pub mod store;
pub mod weather_code;
