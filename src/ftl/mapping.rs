//! Two-level address translation state.
//!
//! The **log map** tracks every block sitting in the append log at LBA
//! granularity; the **data map** tracks, per logical zone, the data zone
//! holding its last merged image. A live log entry shadows the data map.
//! During a merge pass, log entries flip to [`LogSlot::Staging`]: still
//! resolvable by the pass itself, but readers fall through to the data map.
//!
//! All access is serialized by the device's merge mutex; this type carries
//! no locking of its own.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::geometry::Geometry;

/// On-disk bit marking a checkpointed log-map value as staged.
pub(crate) const STAGING_BIT: u64 = 1 << 63;

/// Persisted state of a tracked zone, in the NVMe zone-state encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ZoneState {
    /// Zone holds no live image
    #[default]
    Empty = 0x1,

    /// Zone holds a complete merged image
    Full = 0xE,
}

impl ZoneState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a persisted state byte; anything but `Full` reads as `Empty`.
    pub fn from_u8(v: u8) -> Self {
        if v == ZoneState::Full as u8 {
            ZoneState::Full
        } else {
            ZoneState::Empty
        }
    }
}

/// One log-map entry: the physical block plus its merge-staging flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSlot {
    /// Entry is live; the log shadows the data map for this address
    Live(u64),

    /// Entry is being merged; readers fall through to the data map
    Staging(u64),
}

impl LogSlot {
    /// Physical block address, regardless of staging.
    pub fn pba(self) -> u64 {
        match self {
            LogSlot::Live(pba) | LogSlot::Staging(pba) => pba,
        }
    }

    pub fn is_staging(self) -> bool {
        matches!(self, LogSlot::Staging(_))
    }

    /// Checkpoint encoding: the PBA with the staging flag in the top bit.
    pub(crate) fn encode(self) -> u64 {
        match self {
            LogSlot::Live(pba) => pba,
            LogSlot::Staging(pba) => pba | STAGING_BIT,
        }
    }

    pub(crate) fn decode(v: u64) -> Self {
        if v & STAGING_BIT != 0 {
            LogSlot::Staging(v & !STAGING_BIT)
        } else {
            LogSlot::Live(v)
        }
    }
}

/// Log map, data map, zone states, and the log write pointers.
#[derive(Debug)]
pub struct MappingStore {
    /// Logical byte address -> log-region block
    log_map: HashMap<u64, LogSlot>,

    /// Logical zone -> starting LBA of its merged image
    data_map: HashMap<u64, u64>,

    /// One state per zone; only data and metadata zones are meaningful
    zone_states: Vec<ZoneState>,

    /// First live log block
    pub log_zone_start: u64,

    /// One past the last live log block
    pub log_zone_end: u64,
}

impl MappingStore {
    pub fn new(num_zones: u64) -> Self {
        Self {
            log_map: HashMap::new(),
            data_map: HashMap::new(),
            zone_states: vec![ZoneState::Empty; num_zones as usize],
            log_zone_start: 0,
            log_zone_end: 0,
        }
    }

    /// Resolve a logical address through the log map.
    ///
    /// Returns the physical block and whether the entry is staged; a staged
    /// entry means "fall through to the data map".
    pub fn log_lookup(&self, addr: u64) -> Option<(u64, bool)> {
        self.log_map
            .get(&addr)
            .map(|slot| (slot.pba(), slot.is_staging()))
    }

    pub fn log_insert(&mut self, addr: u64, pba: u64) {
        self.log_map.insert(addr, LogSlot::Live(pba));
    }

    pub fn log_clear(&mut self) {
        self.log_map.clear();
    }

    pub fn log_len(&self) -> usize {
        self.log_map.len()
    }

    /// Resolve a logical zone through the data map.
    pub fn data_lookup(&self, lz: u64) -> Option<u64> {
        self.data_map.get(&lz).copied()
    }

    pub fn data_set(&mut self, lz: u64, pba: u64) {
        self.data_map.insert(lz, pba);
    }

    pub fn data_len(&self) -> usize {
        self.data_map.len()
    }

    pub fn zone_state(&self, zone: u64) -> ZoneState {
        self.zone_states[zone as usize]
    }

    pub fn zone_set_state(&mut self, zone: u64, state: ZoneState) {
        self.zone_states[zone as usize] = state;
    }

    /// First data zone with no live image, if any.
    pub fn find_empty_data_zone(&self, geo: &Geometry) -> Option<u64> {
        (geo.data_zone_first()..geo.data_zone_end())
            .find(|&z| self.zone_states[z as usize] == ZoneState::Empty)
    }

    /// Log zones still free if `pending_blocks` more blocks were appended.
    ///
    /// `L - ceil((end - start + pending) / B)`; may go negative when a
    /// request cannot fit, which is exactly when writers must wait.
    pub fn free_log_zones(&self, geo: &Geometry, pending_blocks: u64) -> i64 {
        let used = self.log_zone_end - self.log_zone_start + pending_blocks;
        let used_zones = used.div_ceil(geo.blocks_per_zone);
        geo.log_zones as i64 - used_zones as i64
    }

    /// Group every log entry by target logical zone and flip it to staging.
    ///
    /// Returns `LZ -> (in-zone block offset -> log PBA)` for the merge pass.
    /// Entries already staged by an abandoned pass are re-staged, so a retry
    /// picks them up again.
    pub fn stage_log_entries(&mut self, geo: &Geometry) -> BTreeMap<u64, BTreeMap<u64, u64>> {
        let mut zone_sets: BTreeMap<u64, BTreeMap<u64, u64>> = BTreeMap::new();
        for (&addr, slot) in self.log_map.iter_mut() {
            let pba = slot.pba();
            zone_sets
                .entry(geo.logical_zone(addr))
                .or_default()
                .insert(geo.zone_offset(addr), pba);
            *slot = LogSlot::Staging(pba);
        }
        zone_sets
    }

    /// Iterate log-map entries in checkpoint encoding.
    pub(crate) fn log_entries_encoded(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.log_map.iter().map(|(&k, &v)| (k, v.encode()))
    }

    /// Iterate data-map entries.
    pub(crate) fn data_entries(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.data_map.iter().map(|(&k, &v)| (k, v))
    }

    /// Install a decoded log-map entry (checkpoint restore).
    pub(crate) fn log_insert_encoded(&mut self, addr: u64, value: u64) {
        self.log_map.insert(addr, LogSlot::decode(value));
    }
}
