mod tag;
pub use tag::{ChallengeTag, category_prefix, derive_tag, slugify};

mod key;
pub use key::{WorkloadKey, derive_key};

mod workload_status;
pub use workload_status::WorkloadStatus;

mod workload_info;
pub use workload_info::WorkloadInfo;

mod challenge;
pub use challenge::{Challenge, Team};

/// Numeric team identifier as stored in the catalog.
///
/// Zero is never a valid team; request validation rejects it before any lookup.
pub type TeamId = u32;

/// Numeric challenge identifier as stored in the catalog.
pub type ChallengeId = u32;

/// Port every challenge container serves HTTP on behind the edge router.
pub const SERVICE_PORT: u16 = 80;
