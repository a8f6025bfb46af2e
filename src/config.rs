//! Device configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of zones reserved for the append log.
pub const DEFAULT_LOG_ZONES: u32 = 3;

/// Default free-log-zone watermark below which the merge worker runs.
pub const DEFAULT_GC_WATERMARK: u32 = 1;

/// Configuration for a [`ZonedFtl`](crate::ZonedFtl) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtlConfig {
    /// Device name (label only; the transport is passed to `init` separately)
    pub device: String,

    /// Number of zones reserved for the log region
    pub log_zones: u32,

    /// Minimum free log zones; at or below this, writers trigger a merge
    pub gc_watermark: u32,

    /// Reset every zone at init and skip checkpoint restore
    pub force_reset: bool,
}

impl Default for FtlConfig {
    fn default() -> Self {
        Self {
            device: "mem".to_string(),
            log_zones: DEFAULT_LOG_ZONES,
            gc_watermark: DEFAULT_GC_WATERMARK,
            force_reset: false,
        }
    }
}

impl FtlConfig {
    /// Create a config for the named device with defaults elsewhere.
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    ///
    /// `log_zones >= gc_watermark + 2` guarantees that at least one zone of
    /// append headroom exists above the watermark, so a drained log can
    /// always accept a write.
    pub fn validate(&self) -> Result<()> {
        if self.log_zones == 0 {
            return Err(Error::InvalidConfig("log_zones must be >= 1".into()));
        }
        if self.gc_watermark + 2 > self.log_zones {
            return Err(Error::InvalidConfig(format!(
                "log_zones ({}) must be >= gc_watermark ({}) + 2",
                self.log_zones, self.gc_watermark
            )));
        }
        Ok(())
    }
}
