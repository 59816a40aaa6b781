//! Configuration management for the mix-scrims service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for the match orchestrator.

pub mod app;
pub mod commands;
pub mod maps;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, InviteSettings, InviteWebhook, MixSettings,
    PunishmentSettings, ServiceSettings,
};
pub use commands::{default_commands, CommandInfo, ADMIN_PERMISSION};
pub use maps::{default_map_catalog, MapCatalog, MapEntry};
