//! Configuration management
//!
//! The versioned config blob, its schema migration, and the encrypted store
//! that persists it.

pub mod migration;
pub mod model;
pub mod store;

pub use model::{CONFIG_VERSION, Config, HealthStatus, ModelState};
pub use store::{ConfigStorage, ConfigStore, FileStorage, MemoryStorage};
