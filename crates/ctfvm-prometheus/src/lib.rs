//! Prometheus metrics backend for the workload lifecycle manager.
//!
//! [`PrometheusMetrics`] implements [`ctfvm_core::LifecycleMetrics`] on a
//! private [`prometheus::Registry`]. Serving `/metrics` is left to the caller:
//!
//! ```rust,ignore
//! let metrics = PrometheusMetrics::new()?;
//! let manager = LifecycleManager::new(runtime, config, Arc::new(metrics.clone()));
//! let body = metrics.encode_text()?;
//! ```
//!
//! ## Metrics
//! - `ctfvm_provisions_total{outcome}` - Counter
//! - `ctfvm_teardowns_total{reason, outcome}` - Counter
//! - `ctfvm_renewals_total` - Counter
//! - `ctfvm_active_workloads` - Gauge
//! - `ctfvm_provision_duration_seconds` - Histogram

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, TextEncoder};
