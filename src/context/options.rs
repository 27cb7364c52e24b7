#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Seconds, DEFAULT_UPDATE_INTERVAL, OFFLINE_CATCH_UP_STEP};

/// Which timing strategy a context runs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Clock follows the hardware, passes fire as time is polled
    Realtime,
    /// Clock is stepped synthetically while rendering
    Offline,
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMode::Realtime => write!(f, "realtime"),
            ContextMode::Offline => write!(f, "offline"),
        }
    }
}

/// Context construction parameters
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub mode: ContextMode,
    /// Hz
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Length of the offline render; ignored in realtime mode
    pub duration_seconds: Option<Seconds>,
    /// Realtime spacing between notification passes
    pub update_interval: Seconds,
    /// Offline drain step
    pub catch_up_step: Seconds,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            mode: ContextMode::Realtime,
            sample_rate: 48_000,
            channel_count: 2,
            duration_seconds: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            catch_up_step: OFFLINE_CATCH_UP_STEP,
        }
    }
}

impl ContextOptions {
    /// Realtime defaults at `sample_rate`
    pub fn realtime(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Offline render of `duration_seconds` with `channel_count` channels
    pub fn offline(channel_count: u16, duration_seconds: Seconds, sample_rate: u32) -> Self {
        Self {
            mode: ContextMode::Offline,
            sample_rate,
            channel_count,
            duration_seconds: Some(duration_seconds),
            ..Self::default()
        }
    }

    pub fn with_channel_count(mut self, channel_count: u16) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn with_update_interval(mut self, update_interval: Seconds) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn with_catch_up_step(mut self, catch_up_step: Seconds) -> Self {
        self.catch_up_step = catch_up_step;
        self
    }

    /// Check every field the selected mode uses
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be greater than zero"));
        }
        if self.channel_count == 0 {
            return Err(invalid("channel_count", "must be greater than zero"));
        }

        match self.mode {
            ContextMode::Realtime => {
                if !is_positive(self.update_interval) {
                    return Err(invalid("update_interval", "must be a positive number of seconds"));
                }
            }
            ContextMode::Offline => {
                match self.duration_seconds {
                    Some(duration) if is_positive(duration) => {}
                    Some(_) => {
                        return Err(invalid("duration_seconds", "must be a positive number of seconds"))
                    }
                    None => return Err(invalid("duration_seconds", "required for offline contexts")),
                }
                if !is_positive(self.catch_up_step) {
                    return Err(invalid("catch_up_step", "must be a positive number of seconds"));
                }
            }
        }

        Ok(())
    }
}

fn is_positive(value: Seconds) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &'static str, reason: &str) -> Error {
    Error::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
