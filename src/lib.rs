pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod types;

// Layered boundaries: ports and orchestration, adapters, record processing
pub mod app;
pub mod infra;
pub mod pipeline;

pub use app::bridge_service::{BridgeService, CycleReport, ServiceState, ServiceStatus};
pub use error::{BridgeError, Result};
