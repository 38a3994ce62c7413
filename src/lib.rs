// Library interface for gsxr-dash
// The binary and the integration tests both go through these modules

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod runtime;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::DashConfig;
pub use dashboard::{Command, Dashboard, DashboardSettings, DashboardUpdate};
pub use errors::DashError;
pub use runtime::{CancellationToken, DashboardRuntime};
pub use telemetry::{RecordedFrame, TelemetrySnapshot};
