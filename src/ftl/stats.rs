//! Operation counters for a device instance.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Statistics for a running device.
#[derive(Debug, Default)]
pub struct FtlStats {
    /// Completed write requests
    pub writes_total: AtomicU64,

    /// Completed read requests
    pub reads_total: AtomicU64,

    /// Blocks appended to the log
    pub blocks_written: AtomicU64,

    /// Blocks returned to readers (including zero fills)
    pub blocks_read: AtomicU64,

    /// Read slices satisfied by zero fill (never-written addresses)
    pub zero_fill_reads: AtomicU64,

    /// Merge passes completed
    pub gc_passes: AtomicU64,

    /// Merge passes abandoned on device error
    pub gc_abandoned: AtomicU64,

    /// Full-zone images written by merges
    pub zones_merged: AtomicU64,

    /// Zone resets issued (log and data)
    pub zones_reset: AtomicU64,

    /// Metadata checkpoints written
    pub checkpoints_written: AtomicU64,
}

impl FtlStats {
    pub fn record_write(&self, blocks: u64) {
        self.writes_total.fetch_add(1, Ordering::Relaxed);
        self.blocks_written.fetch_add(blocks, Ordering::Relaxed);
    }

    pub fn record_read(&self, blocks: u64, zero_fills: u64) {
        self.reads_total.fetch_add(1, Ordering::Relaxed);
        self.blocks_read.fetch_add(blocks, Ordering::Relaxed);
        self.zero_fill_reads.fetch_add(zero_fills, Ordering::Relaxed);
    }

    pub fn record_gc_pass(&self, zones_merged: u64) {
        self.gc_passes.fetch_add(1, Ordering::Relaxed);
        self.zones_merged.fetch_add(zones_merged, Ordering::Relaxed);
    }

    pub fn record_gc_abandoned(&self) {
        self.gc_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_zone_reset(&self) {
        self.zones_reset.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkpoint(&self) {
        self.checkpoints_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> FtlStatsSnapshot {
        FtlStatsSnapshot {
            writes_total: self.writes_total.load(Ordering::Relaxed),
            reads_total: self.reads_total.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            zero_fill_reads: self.zero_fill_reads.load(Ordering::Relaxed),
            gc_passes: self.gc_passes.load(Ordering::Relaxed),
            gc_abandoned: self.gc_abandoned.load(Ordering::Relaxed),
            zones_merged: self.zones_merged.load(Ordering::Relaxed),
            zones_reset: self.zones_reset.load(Ordering::Relaxed),
            checkpoints_written: self.checkpoints_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FtlStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtlStatsSnapshot {
    pub writes_total: u64,
    pub reads_total: u64,
    pub blocks_written: u64,
    pub blocks_read: u64,
    pub zero_fill_reads: u64,
    pub gc_passes: u64,
    pub gc_abandoned: u64,
    pub zones_merged: u64,
    pub zones_reset: u64,
    pub checkpoints_written: u64,
}
