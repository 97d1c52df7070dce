pub mod config;
pub mod core;

pub use config::{AppConfig, StoreLocation};
pub use crate::core::{RegistrationFlow, SqliteBackend};

#[cfg(feature = "gui")]
pub mod gui;
