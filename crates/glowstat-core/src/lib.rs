//! glowstat-core — host telemetry collection library.
//!
//! Provides:
//! - `collector` — sysfs/procfs source discovery and per-tick sampling
//! - `config` — validated collector parameters
//! - `model` — resolved source and snapshot value types

pub mod collector;
pub mod config;
pub mod model;

pub use collector::StatCollector;
pub use collector::sampler::CollectError;
pub use config::{CollectorConfig, GpuKind, HostKind};
pub use model::{MetricSnapshot, ResolvedSources};
