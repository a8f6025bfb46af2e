//! The translation-layer device.
//!
//! [`ZonedFtl`] turns an append-only zoned namespace into a random-access
//! block device. Incoming writes are zone-appended into the log region and
//! recorded in the log map; reads resolve the log map first, the data map
//! second, and zero-fill otherwise. When free log zones fall to the
//! watermark, writers wake the merge worker and sleep until it has drained
//! the log into data zones.
//!
//! All mutable state lives in one `FtlState` value behind a single mutex
//! shared with the merge worker; the two condition variables `gc_wakeup`
//! and `gc_sleep` carry the writer/worker handshake.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::FtlConfig;
use crate::error::{Error, Result};
use crate::zns::{ZnsTransport, ZoneStatus};

use super::checkpoint;
use super::gc;
use super::geometry::Geometry;
use super::mapping::{MappingStore, ZoneState};
use super::stats::{FtlStats, FtlStatsSnapshot};

/// Mutable device state, guarded by the merge mutex.
pub(crate) struct FtlState {
    pub(crate) store: MappingStore,

    /// A merge pass has been requested
    pub(crate) do_gc: bool,

    /// The merge worker must exit
    pub(crate) gc_stop: bool,

    /// Failure message of the last merge pass, if it was abandoned
    pub(crate) last_gc_error: Option<String>,
}

/// State shared between foreground callers and the merge worker.
pub(crate) struct FtlShared {
    pub(crate) geo: Geometry,
    pub(crate) transport: Arc<dyn ZnsTransport>,
    pub(crate) watermark: i64,
    pub(crate) state: Mutex<FtlState>,
    pub(crate) gc_wakeup: Condvar,
    pub(crate) gc_sleep: Condvar,
    pub(crate) stats: FtlStats,
}

/// Identity and layout of an initialized device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device: String,
    pub lba_size: u64,
    pub num_zones: u64,
    pub zone_capacity_bytes: u64,
    pub capacity_bytes: u64,
    pub log_zones: u64,
    pub gc_watermark: u32,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} zones x {} ({} exported, {} log zones, watermark {})",
            self.device,
            self.num_zones,
            human_bytes(self.zone_capacity_bytes),
            human_bytes(self.capacity_bytes),
            self.log_zones,
            self.gc_watermark
        )
    }
}

fn human_bytes(size: u64) -> String {
    if size >= 1024 * 1024 * 1024 {
        format!("{:.2} GiB", size as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if size >= 1024 * 1024 {
        format!("{:.2} MiB", size as f64 / (1024.0 * 1024.0))
    } else if size >= 1024 {
        format!("{:.2} KiB", size as f64 / 1024.0)
    } else {
        format!("{} B", size)
    }
}

/// A random-access block device over a zoned namespace.
pub struct ZonedFtl {
    device: String,
    shared: Arc<FtlShared>,
    gc_worker: Option<JoinHandle<()>>,
}

impl ZonedFtl {
    /// Open a device over the given transport.
    ///
    /// Enumerates zones, optionally force-resets them, restores the
    /// metadata checkpoint, and spawns the merge worker.
    pub fn init(config: FtlConfig, transport: Arc<dyn ZnsTransport>) -> Result<Self> {
        config.validate()?;

        let geo = Geometry {
            lba_size: transport.lba_size(),
            num_zones: transport.num_zones(),
            blocks_per_zone: transport.zone_capacity(),
            log_zones: config.log_zones as u64,
        };
        if geo.log_zones + 2 > geo.num_zones {
            return Err(Error::InvalidConfig(format!(
                "{} zones cannot hold {} log zones, a data zone, and the metadata zone",
                geo.num_zones, geo.log_zones
            )));
        }

        if config.force_reset {
            transport.zone_reset_all()?;
            info!(device = %config.device, "all zones reset");
        }

        let mut store = MappingStore::new(geo.num_zones);
        let report = transport.zone_report()?;
        if report.len() as u64 != geo.num_zones {
            return Err(Error::device_io(
                "zone_report",
                0,
                format!("expected {} zones, got {}", geo.num_zones, report.len()),
            ));
        }

        // Seed data-region and metadata states from the report; log-zone
        // state stays implicit in the write pointers. Only a zone the device
        // reports empty may become a merge target.
        for zone in geo.data_zone_first()..geo.num_zones {
            let state = if report[zone as usize].status == ZoneStatus::Empty {
                ZoneState::Empty
            } else {
                ZoneState::Full
            };
            store.zone_set_state(zone, state);
        }

        let metadata_written =
            report[geo.metadata_zone() as usize].status != ZoneStatus::Empty;
        if !config.force_reset && metadata_written {
            if let Some(data) = checkpoint::restore(transport.as_ref(), &geo)? {
                store.log_zone_start = data.log_zone_start;
                store.log_zone_end = data.log_zone_end;
                for (i, state) in data.zone_states.iter().enumerate() {
                    store.zone_set_state(geo.data_zone_first() + i as u64, *state);
                }
                for (addr, value) in &data.log_map {
                    store.log_insert_encoded(*addr, *value);
                }
                for (lz, pba) in &data.data_map {
                    store.data_set(*lz, *pba);
                }
                info!(
                    device = %config.device,
                    log_entries = data.log_map.len(),
                    data_entries = data.data_map.len(),
                    log_zone_end = data.log_zone_end,
                    "checkpoint restored"
                );
            }
        }

        let shared = Arc::new(FtlShared {
            geo,
            transport,
            watermark: config.gc_watermark as i64,
            state: Mutex::new(FtlState {
                store,
                do_gc: false,
                gc_stop: false,
                last_gc_error: None,
            }),
            gc_wakeup: Condvar::new(),
            gc_sleep: Condvar::new(),
            stats: FtlStats::default(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("zoneftl-gc".to_string())
                .spawn(move || gc::worker_loop(shared))?
        };

        info!(
            device = %config.device,
            zones = geo.num_zones,
            blocks_per_zone = geo.blocks_per_zone,
            lba_size = geo.lba_size,
            capacity = geo.capacity_bytes(),
            "device initialized"
        );

        Ok(Self {
            device: config.device,
            shared,
            gc_worker: Some(worker),
        })
    }

    /// Write `buf` at logical address `addr`.
    ///
    /// `addr` and `buf.len()` must be block-aligned. The request is
    /// appended to the log, split at log-zone boundaries if needed; it may
    /// block while the merge worker frees log space.
    pub fn write(&self, addr: u64, buf: &[u8]) -> Result<()> {
        let geo = self.shared.geo;
        geo.check_request("write", addr, buf.len() as u64)?;
        if buf.is_empty() {
            return Ok(());
        }

        let blocks = buf.len() as u64 / geo.lba_size;
        let max_blocks =
            (geo.log_zones - self.shared.watermark as u64 - 1) * geo.blocks_per_zone;
        if blocks > max_blocks {
            return Err(Error::WriteTooLarge { blocks, max_blocks });
        }

        let mut state = self.shared.state.lock();
        while state.store.free_log_zones(&geo, blocks) <= self.shared.watermark {
            state.do_gc = true;
            self.shared.gc_wakeup.notify_one();
            self.shared.gc_sleep.wait(&mut state);
        }

        let mut done = 0u64;
        while done < blocks {
            let end = state.store.log_zone_end;
            let zone_no = end / geo.blocks_per_zone;
            let in_zone = end % geo.blocks_per_zone;
            let chunk = (geo.blocks_per_zone - in_zone).min(blocks - done);

            let byte_off = (done * geo.lba_size) as usize;
            let byte_len = (chunk * geo.lba_size) as usize;
            let res_lba = self
                .shared
                .transport
                .zone_append(geo.zone_start_lba(zone_no), &buf[byte_off..byte_off + byte_len])?;

            state.store.log_zone_end = res_lba + chunk;
            for i in 0..chunk {
                state
                    .store
                    .log_insert(addr + (done + i) * geo.lba_size, res_lba + i);
            }
            done += chunk;
        }

        self.shared.stats.record_write(blocks);
        debug!(addr, blocks, "write appended to log");
        Ok(())
    }

    /// Read `buf.len()` bytes from logical address `addr`.
    ///
    /// Addresses never written read back as zeros.
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let geo = self.shared.geo;
        geo.check_request("read", addr, buf.len() as u64)?;
        if buf.is_empty() {
            return Ok(());
        }

        let blocks = buf.len() as u64 / geo.lba_size;
        let lba_size = geo.lba_size as usize;
        let state = self.shared.state.lock();

        let mut zero_fills = 0u64;
        for i in 0..blocks {
            let la = addr + i * geo.lba_size;
            let slice = &mut buf[i as usize * lba_size..][..lba_size];

            // A live log entry wins; a staged or absent one falls through
            // to the merged image.
            let pba = match state.store.log_lookup(la) {
                Some((pba, false)) => Some(pba),
                _ => state
                    .store
                    .data_lookup(geo.logical_zone(la))
                    .map(|zone_lba| zone_lba + geo.zone_offset(la)),
            };

            match pba {
                Some(pba) => self.shared.transport.read_lbas(pba, slice)?,
                None => {
                    slice.fill(0);
                    zero_fills += 1;
                }
            }
        }

        self.shared.stats.record_read(blocks, zero_fills);
        Ok(())
    }

    /// Run one merge pass synchronously and wait for it to finish.
    ///
    /// Uses the same handshake as a watermark-blocked writer. Returns the
    /// pass's failure if it was abandoned on a device error.
    pub fn drain_log(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.do_gc = true;
        self.shared.gc_wakeup.notify_one();
        while state.do_gc {
            self.shared.gc_sleep.wait(&mut state);
        }
        match state.last_gc_error.take() {
            Some(detail) => Err(Error::device_io("merge", 0, detail)),
            None => Ok(()),
        }
    }

    /// Persist the checkpoint, stop the merge worker, and release the
    /// device.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.gc_worker.take() else {
            return Ok(());
        };

        {
            let mut state = self.shared.state.lock();
            state.gc_stop = true;
            self.shared.gc_wakeup.notify_one();
        }
        if worker.join().is_err() {
            warn!(device = %self.device, "merge worker panicked before join");
        }

        let state = self.shared.state.lock();
        checkpoint::save(self.shared.transport.as_ref(), &self.shared.geo, &state.store)?;
        self.shared.stats.record_checkpoint();
        info!(device = %self.device, "device closed, checkpoint persisted");
        Ok(())
    }

    /// Block size in bytes.
    pub fn lba_size(&self) -> u64 {
        self.shared.geo.lba_size
    }

    /// Total zones in the namespace.
    pub fn num_zones(&self) -> u64 {
        self.shared.geo.num_zones
    }

    /// Writable bytes per zone.
    pub fn zone_capacity_bytes(&self) -> u64 {
        self.shared.geo.zone_bytes()
    }

    /// Exported logical capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.shared.geo.capacity_bytes()
    }

    /// Identity and layout summary.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            device: self.device.clone(),
            lba_size: self.shared.geo.lba_size,
            num_zones: self.shared.geo.num_zones,
            zone_capacity_bytes: self.shared.geo.zone_bytes(),
            capacity_bytes: self.shared.geo.capacity_bytes(),
            log_zones: self.shared.geo.log_zones,
            gc_watermark: self.shared.watermark as u32,
        }
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> FtlStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for ZonedFtl {
    fn drop(&mut self) {
        if self.gc_worker.is_some() {
            if let Err(e) = self.shutdown() {
                warn!(device = %self.device, error = %e, "shutdown during drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zns::MemZns;

    const LBA: u64 = 4096;

    fn open(log_zones: u32, wmark: u32) -> ZonedFtl {
        let transport = Arc::new(MemZns::new(8, 4, LBA));
        let config = FtlConfig {
            device: "mem-test".to_string(),
            log_zones,
            gc_watermark: wmark,
            force_reset: true,
        };
        ZonedFtl::init(config, transport).unwrap()
    }

    fn block(tag: u8) -> Vec<u8> {
        vec![tag; LBA as usize]
    }

    #[test]
    fn test_init_exports_data_capacity() {
        let ftl = open(3, 1);
        assert_eq!(ftl.lba_size(), LBA);
        assert_eq!(ftl.num_zones(), 8);
        // 8 zones - 3 log - 1 metadata = 4 data zones
        assert_eq!(ftl.capacity_bytes(), 4 * 4 * LBA);
        ftl.close().unwrap();
    }

    #[test]
    fn test_write_then_read() {
        let ftl = open(3, 1);
        ftl.write(0, &block(0xA1)).unwrap();

        let mut out = block(0);
        ftl.read(0, &mut out).unwrap();
        assert_eq!(out, block(0xA1));
        ftl.close().unwrap();
    }

    #[test]
    fn test_unwritten_reads_zero() {
        let ftl = open(3, 1);
        let mut out = block(0xFF);
        ftl.read(8 * LBA, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));

        let stats = ftl.stats();
        assert_eq!(stats.zero_fill_reads, 1);
        ftl.close().unwrap();
    }

    #[test]
    fn test_alignment_rejected() {
        let ftl = open(3, 1);
        let mut short = vec![0u8; 100];
        assert!(matches!(
            ftl.read(0, &mut short),
            Err(Error::Alignment { .. })
        ));
        assert!(matches!(
            ftl.write(123, &block(1)),
            Err(Error::Alignment { .. })
        ));
        ftl.close().unwrap();
    }

    #[test]
    fn test_out_of_range_rejected() {
        let ftl = open(3, 1);
        let cap = ftl.capacity_bytes();
        assert!(matches!(
            ftl.write(cap, &block(1)),
            Err(Error::OutOfRange { .. })
        ));
        ftl.close().unwrap();
    }

    #[test]
    fn test_oversized_write_rejected() {
        let ftl = open(3, 1);
        // Budget is (3 - 1 - 1) * 4 = 4 blocks
        let buf = vec![7u8; 5 * LBA as usize];
        assert!(matches!(
            ftl.write(0, &buf),
            Err(Error::WriteTooLarge { max_blocks: 4, .. })
        ));
        ftl.close().unwrap();
    }

    #[test]
    fn test_write_splits_across_log_zones() {
        // Watermark 0 so a boundary-crossing write does not wake the merge
        // worker first: 2 blocks land in log zone 0, then a 4-block write
        // must straddle log zones 0 and 1.
        let ftl = open(4, 0);
        let a: Vec<u8> = (0..2 * LBA as usize).map(|i| (i % 199) as u8).collect();
        let b: Vec<u8> = (0..4 * LBA as usize).map(|i| (i % 97) as u8).collect();
        ftl.write(0, &a).unwrap();
        ftl.write(4 * LBA, &b).unwrap();

        let report = ftl.shared.transport.zone_report().unwrap();
        assert_eq!(report[0].status, ZoneStatus::Full);
        assert_eq!(report[1].write_pointer, 2);

        let mut out = vec![0u8; a.len()];
        ftl.read(0, &mut out).unwrap();
        assert_eq!(out, a);
        let mut out = vec![0u8; b.len()];
        ftl.read(4 * LBA, &mut out).unwrap();
        assert_eq!(out, b);
        ftl.close().unwrap();
    }

    #[test]
    fn test_drain_log_resets_log_region() {
        let ftl = open(3, 1);
        let transport = Arc::clone(&ftl.shared.transport);
        ftl.write(0, &block(0x42)).unwrap();
        ftl.drain_log().unwrap();

        let report = transport.zone_report().unwrap();
        for zone in &report[..3] {
            assert_eq!(zone.status, ZoneStatus::Empty);
            assert_eq!(zone.write_pointer, 0);
        }

        let mut out = block(0);
        ftl.read(0, &mut out).unwrap();
        assert_eq!(out, block(0x42));
        ftl.close().unwrap();
    }

    #[test]
    fn test_empty_request_is_noop() {
        let ftl = open(3, 1);
        ftl.write(0, &[]).unwrap();
        let mut empty: [u8; 0] = [];
        ftl.read(0, &mut empty).unwrap();
        assert_eq!(ftl.stats().writes_total, 0);
        ftl.close().unwrap();
    }
}
