mod error;
pub use error::CoreError;

pub mod runtime;
pub use runtime::{BuildSpec, ContainerSpec, MemoryRuntime, Runtime, RuntimeContainer, RuntimeError};

pub mod locks;
pub use locks::{KeyGuard, KeyLocks};

pub mod expiry;
pub use expiry::{ExpiryScheduler, ExpiryTimer};

pub mod state;
pub use state::WorkloadRegistry;

pub mod metrics;
pub use metrics::{LifecycleMetrics, NoopMetrics, ProvisionOutcome, TeardownReason};

pub mod manager;
pub use manager::{LifecycleConfig, LifecycleManager};

mod system;
pub use system::{host_name, init_uptime, uptime_seconds};
