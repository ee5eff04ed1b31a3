//! Burrow client runtime
//!
//! [`ConfigManager`] keeps the tunnel engine in sync with the config file and
//! the API-editable store; [`api::Controller`] exposes it to an admin API.

pub mod api;
pub mod engine;
mod error;
pub mod manager;

pub use api::{ApiError, Controller};
pub use engine::{EngineError, ProxyPhase, StatusRegistry, TunnelEngine, WorkingStatus};
pub use error::ManagerError;
pub use manager::ConfigManager;
