//! Watchdog library for the MuleCube edge device
//!
//! This crate provides the core functionality for:
//! - Probing container health through the container runtime
//! - Reading thermal and battery stress from the hardware monitor
//! - Rate-limited restarts of unhealthy and stopped critical services
//! - Thermal and battery load shedding with hysteresis
//! - The reconciliation loop tying these together

pub mod catalog;
pub mod config;
pub mod error;
pub mod governor;
pub mod models;
pub mod observability;
pub mod probe;
pub mod reconciler;
pub mod runtime;
pub mod shedding;
pub mod stress;

pub use catalog::{Category, CategorySet, ServiceCatalog};
pub use config::WatchdogConfig;
pub use error::{ConfigError, RuntimeError, RuntimeResult};
pub use models::*;
pub use observability::StructuredLogger;
pub use reconciler::{Reconciler, TickReport};
