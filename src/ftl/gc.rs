//! Background merge worker.
//!
//! One dedicated thread drains the append log into data zones. A pass
//! stages every log entry by target logical zone, then read-modify-writes
//! each affected zone: the previous merged image (if any) is loaded, the
//! staged log blocks are overlaid at their in-zone offsets, and the result
//! is written out as one full-zone image. Only after the new image is on
//! the device does the data map move and the predecessor zone get reset,
//! so readers never observe a torn zone. The pass ends by resetting the
//! whole log region and clearing the log map.
//!
//! The worker holds the device mutex for the full pass; writers blocked on
//! the watermark sleep on `gc_sleep` until the pass signals completion. A
//! device error abandons the pass without touching the log region: staged
//! entries keep their physical blocks, so the next pass retries them.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::zns::{read_chunked, write_chunked};

use super::device::{FtlShared, FtlState};
use super::mapping::ZoneState;

pub(crate) fn worker_loop(shared: Arc<FtlShared>) {
    loop {
        let mut state = shared.state.lock();
        while !state.gc_stop && !state.do_gc {
            shared.gc_wakeup.wait(&mut state);
        }

        if state.gc_stop {
            debug!("merge worker stopping");
            break;
        }

        match run_pass(&shared, &mut state) {
            Ok(zones_merged) => {
                shared.stats.record_gc_pass(zones_merged);
                state.last_gc_error = None;
                debug!(zones_merged, "merge pass complete");
            }
            Err(e) => {
                shared.stats.record_gc_abandoned();
                error!(error = %e, "merge pass abandoned");
                state.last_gc_error = Some(e.to_string());
            }
        }

        state.do_gc = false;
        shared.gc_sleep.notify_all();
    }
}

/// Execute one full merge pass under the device mutex.
fn run_pass(shared: &FtlShared, state: &mut FtlState) -> Result<u64> {
    let geo = shared.geo;
    let dev = shared.transport.as_ref();
    let lba_size = geo.lba_size as usize;

    let zone_sets = state.store.stage_log_entries(&geo);
    let mut zones_merged = 0u64;

    for (lz, staged) in &zone_sets {
        // Pick the landing zone up front: the first empty data zone, or
        // fall back to rewriting the old image in place when none is left.
        let (target, used_log) = match state.store.find_empty_data_zone(&geo) {
            Some(zone) => (zone, false),
            None => (geo.log_zones - 1, true),
        };

        let mut image = vec![0u8; geo.zone_bytes() as usize];
        let mut old_zone = None;
        if let Some(old_pba) = state.store.data_lookup(*lz) {
            read_chunked(dev, old_pba, &mut image)?;
            state
                .store
                .zone_set_state(old_pba / geo.blocks_per_zone, ZoneState::Empty);
            old_zone = Some(old_pba);
        }

        // Overlay the staged log blocks at their in-zone offsets
        for (&off, &pba) in staged {
            let slice = &mut image[off as usize * lba_size..][..lba_size];
            dev.read_lbas(pba, slice)?;
        }

        if used_log {
            // Every data zone is full: rewrite the old image in place. The
            // data map already points here, so it stays untouched.
            let old_pba = old_zone.ok_or(Error::CapacityExhausted)?;
            dev.zone_reset(old_pba)?;
            shared.stats.record_zone_reset();
            write_chunked(dev, old_pba, &image)?;
            state
                .store
                .zone_set_state(old_pba / geo.blocks_per_zone, ZoneState::Full);
        } else {
            let target_lba = geo.zone_start_lba(target);
            write_chunked(dev, target_lba, &image)?;
            state.store.data_set(*lz, target_lba);
            state.store.zone_set_state(target, ZoneState::Full);

            // The predecessor is reset only now that its replacement is
            // durable and mapped.
            if let Some(old_pba) = old_zone {
                dev.zone_reset(old_pba)?;
                shared.stats.record_zone_reset();
            }
        }
        zones_merged += 1;
    }

    // The whole log region is drained: reset it and drop the log map.
    for zone in 0..geo.log_zones {
        dev.zone_reset(geo.zone_start_lba(zone))?;
        shared.stats.record_zone_reset();
    }
    state.store.log_zone_end = state.store.log_zone_start;
    state.store.log_clear();

    if zones_merged > 0 {
        info!(
            zones_merged,
            log_zones_reset = geo.log_zones,
            "log drained into data zones"
        );
    }
    Ok(zones_merged)
}
