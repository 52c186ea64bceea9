//! Docker Engine adapter for [`ctfvm_core::Runtime`].
//!
//! Talks to the local daemon through `bollard`. Image builds stream the
//! challenge directory as a tar context; containers are joined to the
//! routing network and carry the reverse-proxy labels computed by the core.

mod context;
mod runtime;

pub use runtime::DockerRuntime;
