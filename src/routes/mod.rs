pub mod delivery_fee;
pub mod health;
