//! Property-Based Tests for the Translation Core
//!
//! # Test Properties
//!
//! 1. **Checkpoint codec**: decode(encode(state)) preserves pointers, zone
//!    states, and both maps for arbitrary contents.
//! 2. **Log accounting**: `free_log_zones` never reports free space that
//!    does not exist and shrinks monotonically with pending blocks.
//! 3. **Address arithmetic**: logical zone + in-zone offset reconstruct the
//!    original address.

#![cfg(test)]

use proptest::prelude::*;

use super::checkpoint;
use super::geometry::Geometry;
use super::mapping::{MappingStore, STAGING_BIT};

const GEO: Geometry = Geometry {
    lba_size: 4096,
    num_zones: 16,
    blocks_per_zone: 8,
    log_zones: 4,
};

/// Strategy for log-map contents: aligned addresses to log-region blocks,
/// some staged.
fn log_map_strategy() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec(
        (0u64..GEO.capacity_bytes() / GEO.lba_size, 0u64..GEO.log_blocks(), any::<bool>()),
        0..32,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(block, pba, staged)| {
                let value = if staged { pba | STAGING_BIT } else { pba };
                (block * GEO.lba_size, value)
            })
            .collect()
    })
}

/// Strategy for data-map contents: logical zones to zone-aligned LBAs.
fn data_map_strategy() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec(
        (
            GEO.data_zone_first()..GEO.data_zone_end(),
            GEO.data_zone_first()..GEO.data_zone_end(),
        ),
        0..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(lz, zone)| (lz, zone * GEO.blocks_per_zone))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: the checkpoint record survives a codec round trip.
    #[test]
    fn prop_checkpoint_round_trip(
        log_entries in log_map_strategy(),
        data_entries in data_map_strategy(),
        log_end in 0u64..=32,
    ) {
        let mut store = MappingStore::new(GEO.num_zones);
        store.log_zone_end = log_end;
        for (addr, value) in &log_entries {
            store.log_insert_encoded(*addr, *value);
        }
        for (lz, pba) in &data_entries {
            store.data_set(*lz, *pba);
        }

        let record = checkpoint::encode(&GEO, &store);
        prop_assert_eq!(record.len() as u64 % GEO.lba_size, 0);

        let decoded = checkpoint::decode(&GEO, &record).expect("record should parse");
        prop_assert_eq!(decoded.log_zone_end, log_end);

        let mut restored = MappingStore::new(GEO.num_zones);
        for (addr, value) in &decoded.log_map {
            restored.log_insert_encoded(*addr, *value);
        }
        for (addr, _) in &log_entries {
            prop_assert_eq!(restored.log_lookup(*addr), store.log_lookup(*addr));
        }
        for (lz, _) in &data_entries {
            let found = decoded.data_map.iter().find(|(k, _)| k == lz);
            prop_assert_eq!(found.map(|&(_, v)| v), store.data_lookup(*lz));
        }
    }

    /// Property: log accounting is conservative and monotone.
    #[test]
    fn prop_free_log_zones_bounds(
        used in 0u64..=32,
        pending in 0u64..=16,
    ) {
        let mut store = MappingStore::new(GEO.num_zones);
        store.log_zone_end = used;

        let free_now = store.free_log_zones(&GEO, 0);
        prop_assert!(free_now >= 0);
        prop_assert!(free_now <= GEO.log_zones as i64);

        let free_after = store.free_log_zones(&GEO, pending);
        prop_assert!(free_after <= free_now);
        prop_assert!(free_after >= free_now - pending.div_ceil(GEO.blocks_per_zone) as i64);
    }

    /// Property: zone/offset decomposition reconstructs the address.
    #[test]
    fn prop_address_decomposition(
        block in 0u64..(GEO.capacity_bytes() / GEO.lba_size),
    ) {
        let addr = block * GEO.lba_size;
        let lz = GEO.logical_zone(addr);
        let off = GEO.zone_offset(addr);

        prop_assert!(lz >= GEO.data_zone_first());
        prop_assert!(lz < GEO.data_zone_end());
        prop_assert!(off < GEO.blocks_per_zone);
        prop_assert_eq!(
            (lz - GEO.log_zones) * GEO.zone_bytes() + off * GEO.lba_size,
            addr
        );
    }
}
