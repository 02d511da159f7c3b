/// Game creation, listing, editing and deletion.
pub mod game_service;
/// Store health report.
pub mod health_service;
/// Opening the record store from configuration.
pub mod store_service;
