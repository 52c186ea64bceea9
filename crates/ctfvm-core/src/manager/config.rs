use std::{path::PathBuf, time::Duration};

/// Settings the lifecycle manager reads at provision and renew time.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Inactivity window before a workload is torn down.
    pub ttl: Duration,
    /// Domain appended to workload hostnames.
    pub base_domain: String,
    /// Runtime network every workload is attached to.
    pub network: String,
    /// Directory holding `challenges/<tag>/`.
    pub challenges_root: PathBuf,
    /// Grace period given to a container before it is killed.
    pub stop_grace: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            base_domain: "ctf.local".to_string(),
            network: "ctf-network".to_string(),
            challenges_root: PathBuf::from("."),
            stop_grace: Duration::from_secs(10),
        }
    }
}

impl LifecycleConfig {
    pub(crate) fn challenge_dir(&self, tag: &str) -> PathBuf {
        self.challenges_root.join("challenges").join(tag)
    }
}
