//! Directory and session tuning knobs.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Configuration shared by the directories and the session service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TollgateConfig {
    /// Page size cap; negative or larger requested limits are clamped to it.
    pub default_limit: u64,
    /// Minimum password length enforced by the default format checker.
    pub min_password_length: usize,
    /// Shortest session a login may create, and the window that counts a
    /// user as online (default: 300 = 5 minutes).
    pub minimum_online_threshold_secs: u64,
}

impl TollgateConfig {
    /// Saturates at [`TimeDelta::MAX`] for values chrono cannot represent.
    pub fn minimum_online_threshold(&self) -> TimeDelta {
        i64::try_from(self.minimum_online_threshold_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            default_limit: 500,
            min_password_length: 9,
            minimum_online_threshold_secs: 300,
        }
    }
}
