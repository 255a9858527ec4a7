//! aisle-core: Runtime plumbing shared by the aisle ingestion binary.
//!
//! - `config/` - YAML loading, multi-file merging and environment variable interpolation
//! - `metrics/` - `InternalEvent` trait, `emit!` macro and the Prometheus endpoint
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Subscriber initialization
//! - `error` - Configuration and metrics errors

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod tracing;

pub use config::{ConfigArgs, ConfigPath, Mergeable, MetricsConfig, interpolate, load_from_paths};
pub use error::{ConfigError, MetricsError};
pub use self::metrics::init_global as init_metrics;
pub use signal::{shutdown_signal, shutdown_token};
pub use self::tracing::init_tracing;
