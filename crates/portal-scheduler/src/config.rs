//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Settings for [`SchedulerService`](crate::SchedulerService) and the
/// task manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone all cron triggers fire in. Defaults to UTC.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Seconds running tasks get to observe the shutdown token before
    /// the engine is stopped.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Seconds a freshly created or edited task is held back before its
    /// first fire, so rapid edits settle before anything runs.
    #[serde(default = "default_task_start_delay")]
    pub task_start_delay_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_task_start_delay() -> u64 {
    90
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            task_start_delay_secs: default_task_start_delay(),
        }
    }
}

impl SchedulerConfig {
    /// The configured timezone as a [`chrono_tz::Tz`].
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidTimezone` when the name is not a valid
    /// IANA identifier.
    pub fn parse_timezone(&self) -> Result<chrono_tz::Tz, SchedulerError> {
        self.default_timezone
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(self.default_timezone.clone()))
    }
}
