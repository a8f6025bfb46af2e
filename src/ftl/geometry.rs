//! Address arithmetic for the zoned layout.
//!
//! The namespace is partitioned at init into three regions: log zones
//! `[0, L)`, data zones `[L, Z-1)`, and the reserved metadata zone `Z-1`.
//! Logical byte addresses map onto data-zone slots; the helpers here are the
//! single source of that arithmetic.

use crate::error::{Error, Result};

/// Fixed layout parameters of an initialized device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Block size in bytes
    pub lba_size: u64,

    /// Total zones in the namespace
    pub num_zones: u64,

    /// Writable blocks per zone
    pub blocks_per_zone: u64,

    /// Zones reserved for the append log
    pub log_zones: u64,
}

impl Geometry {
    /// Bytes per zone.
    pub fn zone_bytes(&self) -> u64 {
        self.blocks_per_zone * self.lba_size
    }

    /// Exported logical capacity: data zones only.
    pub fn capacity_bytes(&self) -> u64 {
        (self.num_zones - self.log_zones - 1) * self.zone_bytes()
    }

    /// First data zone index.
    pub fn data_zone_first(&self) -> u64 {
        self.log_zones
    }

    /// One past the last data zone index.
    pub fn data_zone_end(&self) -> u64 {
        self.num_zones - 1
    }

    /// Index of the reserved metadata zone.
    pub fn metadata_zone(&self) -> u64 {
        self.num_zones - 1
    }

    /// Starting LBA of a zone.
    pub fn zone_start_lba(&self, zone: u64) -> u64 {
        zone * self.blocks_per_zone
    }

    /// Total blocks in the log region.
    pub fn log_blocks(&self) -> u64 {
        self.log_zones * self.blocks_per_zone
    }

    /// Data-zone slot that holds the merged image of a logical address.
    pub fn logical_zone(&self, addr: u64) -> u64 {
        addr / self.zone_bytes() + self.log_zones
    }

    /// Block offset of a logical address within its data-zone slot.
    pub fn zone_offset(&self, addr: u64) -> u64 {
        (addr % self.zone_bytes()) / self.lba_size
    }

    /// Validate an I/O request against alignment and capacity.
    pub fn check_request(&self, op: &'static str, addr: u64, size: u64) -> Result<()> {
        if size % self.lba_size != 0 || addr % self.lba_size != 0 {
            return Err(Error::Alignment {
                op,
                addr,
                size,
                lba_size: self.lba_size,
            });
        }
        if addr + size > self.capacity_bytes() {
            return Err(Error::OutOfRange {
                addr,
                size,
                capacity: self.capacity_bytes(),
            });
        }
        Ok(())
    }
}
