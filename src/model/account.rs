//! Account status lines shown once a session is connected

use crate::services::remote::{AccountInfo, SpaceUsage};

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// What the shell shows about the connected account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub account: AccountInfo,
    pub usage: SpaceUsage,
}

impl AccountSummary {
    pub fn new(account: AccountInfo, usage: SpaceUsage) -> Self {
        Self { account, usage }
    }

    /// `Connected as {name} ({id})`
    pub fn status_line(&self) -> String {
        format!(
            "Connected as {} ({})",
            self.account.display_name, self.account.account_id
        )
    }

    /// Share of the quota in use, 0 when nothing is allocated
    pub fn used_percent(&self) -> f64 {
        if self.usage.allocated == 0 {
            return 0.0;
        }
        self.usage.used as f64 / self.usage.allocated as f64 * 100.0
    }

    /// `{percent}% used ({used} of {allocated} GiB)`
    pub fn usage_line(&self) -> String {
        format!(
            "{:.2}% used ({:.2} of {:.2} GiB)",
            self.used_percent(),
            self.usage.used as f64 / BYTES_PER_GIB,
            self.usage.allocated as f64 / BYTES_PER_GIB
        )
    }
}
