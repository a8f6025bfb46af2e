//! Metadata checkpoint in the reserved zone.
//!
//! The last zone of the namespace holds a single self-describing record:
//! the log write pointers, the data-region bounds, the per-data-zone state
//! bytes, and both translation maps, padded to the next block boundary. All
//! integers are little-endian. The record is rewritten wholesale (zone
//! reset, then one append); the zone never holds user data.
//!
//! A record that cannot be parsed — zero or out-of-bounds declared size,
//! truncated body, or region bounds that disagree with the device geometry —
//! counts as "no checkpoint" and the device starts fresh.

use tracing::{debug, warn};

use crate::error::Result;
use crate::zns::{read_chunked, ZnsTransport};

use super::geometry::Geometry;
use super::mapping::{MappingStore, ZoneState};

/// Decoded contents of a checkpoint record.
#[derive(Debug)]
pub(crate) struct CheckpointData {
    pub log_zone_start: u64,
    pub log_zone_end: u64,
    /// States of the data zones `[L, Z-1)`, in zone order
    pub zone_states: Vec<ZoneState>,
    /// Log-map entries in on-disk encoding (staging bit preserved)
    pub log_map: Vec<(u64, u64)>,
    pub data_map: Vec<(u64, u64)>,
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Forward-only reader over the record body; `None` means truncation.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.buf.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|s| u32::from_le_bytes(s.try_into().unwrap()))
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|s| u64::from_le_bytes(s.try_into().unwrap()))
    }
}

/// Serialize the mapping state into a block-padded record.
pub(crate) fn encode(geo: &Geometry, store: &MappingStore) -> Vec<u8> {
    let mut buf = Vec::with_capacity(geo.lba_size as usize);

    put_u32(&mut buf, 0); // total_bytes backpatched below
    put_u32(&mut buf, store.log_zone_start as u32);
    put_u32(&mut buf, store.log_zone_end as u32);
    put_u32(&mut buf, geo.zone_start_lba(geo.data_zone_first()) as u32);
    put_u32(&mut buf, geo.zone_start_lba(geo.data_zone_end()) as u32);

    for zone in geo.data_zone_first()..geo.data_zone_end() {
        buf.push(store.zone_state(zone).as_u8());
    }

    put_u32(&mut buf, store.log_len() as u32);
    put_u32(&mut buf, store.data_len() as u32);

    for (key, value) in store.log_entries_encoded() {
        put_u64(&mut buf, key);
        put_u64(&mut buf, value);
    }
    for (key, value) in store.data_entries() {
        put_u64(&mut buf, key);
        put_u64(&mut buf, value);
    }

    let total = buf.len() as u32;
    buf[0..4].copy_from_slice(&total.to_le_bytes());

    // Zero-pad to the next block boundary
    let padded = (buf.len() as u64).div_ceil(geo.lba_size) * geo.lba_size;
    buf.resize(padded as usize, 0);
    buf
}

/// Parse a record body. The declared-size header has already been checked.
pub(crate) fn decode(geo: &Geometry, buf: &[u8]) -> Option<CheckpointData> {
    let mut cur = Cursor::new(buf);

    let total = cur.u32()? as usize;
    if total == 0 || total > buf.len() {
        return None;
    }

    let log_zone_start = cur.u32()? as u64;
    let log_zone_end = cur.u32()? as u64;
    let data_zone_start = cur.u32()? as u64;
    let data_zone_end = cur.u32()? as u64;

    // Region bounds are derived from the geometry; disagreement means the
    // record belongs to a different layout.
    if data_zone_start != geo.zone_start_lba(geo.data_zone_first())
        || data_zone_end != geo.zone_start_lba(geo.data_zone_end())
        || log_zone_end > geo.log_blocks()
        || log_zone_start > log_zone_end
    {
        return None;
    }

    let data_zones = (geo.data_zone_end() - geo.data_zone_first()) as usize;
    let mut zone_states = Vec::with_capacity(data_zones);
    for _ in 0..data_zones {
        zone_states.push(ZoneState::from_u8(cur.u8()?));
    }

    let log_len = cur.u32()? as usize;
    let data_len = cur.u32()? as usize;

    let mut log_map = Vec::with_capacity(log_len);
    for _ in 0..log_len {
        let key = cur.u64()?;
        let value = cur.u64()?;
        log_map.push((key, value));
    }

    let mut data_map = Vec::with_capacity(data_len);
    for _ in 0..data_len {
        let key = cur.u64()?;
        let value = cur.u64()?;
        data_map.push((key, value));
    }

    Some(CheckpointData {
        log_zone_start,
        log_zone_end,
        zone_states,
        log_map,
        data_map,
    })
}

/// Write the current mapping state to the metadata zone.
pub(crate) fn save(dev: &dyn ZnsTransport, geo: &Geometry, store: &MappingStore) -> Result<()> {
    let record = encode(geo, store);
    let zslba = geo.zone_start_lba(geo.metadata_zone());

    dev.zone_reset(zslba)?;
    dev.zone_append(zslba, &record)?;
    debug!(
        bytes = record.len(),
        log_entries = store.log_len(),
        data_entries = store.data_len(),
        "checkpoint written"
    );
    Ok(())
}

/// Read and parse the checkpoint, if one exists.
pub(crate) fn restore(dev: &dyn ZnsTransport, geo: &Geometry) -> Result<Option<CheckpointData>> {
    let zslba = geo.zone_start_lba(geo.metadata_zone());
    let lba_size = geo.lba_size;

    let mut header = vec![0u8; lba_size as usize];
    dev.read_lbas(zslba, &mut header)?;

    let total = u32::from_le_bytes(header[0..4].try_into().unwrap()) as u64;
    if total == 0 {
        return Ok(None);
    }
    if total > geo.zone_bytes() {
        warn!(
            declared = total,
            zone_bytes = geo.zone_bytes(),
            "checkpoint size header out of bounds, starting fresh"
        );
        return Ok(None);
    }

    let padded = total.div_ceil(lba_size) * lba_size;
    let mut record = vec![0u8; padded as usize];
    read_chunked(dev, zslba, &mut record)?;

    let decoded = decode(geo, &record);
    if decoded.is_none() {
        warn!(declared = total, "checkpoint record unparseable, starting fresh");
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftl::mapping::STAGING_BIT;

    fn geo() -> Geometry {
        Geometry {
            lba_size: 4096,
            num_zones: 8,
            blocks_per_zone: 4,
            log_zones: 3,
        }
    }

    fn populated_store() -> MappingStore {
        let g = geo();
        let mut store = MappingStore::new(g.num_zones);
        store.log_zone_end = 5;
        store.log_insert(0, 0);
        store.log_insert(4096, 1);
        store.log_insert_encoded(8192, 4 | STAGING_BIT);
        store.data_set(3, 12);
        store.data_set(5, 20);
        store.zone_set_state(3, ZoneState::Full);
        store.zone_set_state(5, ZoneState::Full);
        store
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let g = geo();
        let store = populated_store();

        let record = encode(&g, &store);
        assert_eq!(record.len() as u64 % g.lba_size, 0);

        let data = decode(&g, &record).expect("record should parse");
        assert_eq!(data.log_zone_start, 0);
        assert_eq!(data.log_zone_end, 5);
        assert_eq!(
            data.zone_states,
            vec![
                ZoneState::Full,
                ZoneState::Empty,
                ZoneState::Full,
                ZoneState::Empty
            ]
        );

        let mut log: Vec<_> = data.log_map.clone();
        log.sort_unstable();
        assert_eq!(log, vec![(0, 0), (4096, 1), (8192, 4 | STAGING_BIT)]);

        let mut dm: Vec<_> = data.data_map.clone();
        dm.sort_unstable();
        assert_eq!(dm, vec![(3, 12), (5, 20)]);
    }

    #[test]
    fn test_decode_rejects_truncated_record() {
        let g = geo();
        let store = populated_store();
        let record = encode(&g, &store);

        // Chop the body but keep the size header intact
        assert!(decode(&g, &record[..24]).is_none());
    }

    #[test]
    fn test_decode_rejects_foreign_geometry() {
        let g = geo();
        let store = populated_store();
        let record = encode(&g, &store);

        let other = Geometry {
            log_zones: 2,
            ..g
        };
        assert!(decode(&other, &record).is_none());
    }

    #[test]
    fn test_decode_rejects_zero_size() {
        let g = geo();
        let record = vec![0u8; g.lba_size as usize];
        assert!(decode(&g, &record).is_none());
    }

    #[test]
    fn test_save_restore_on_device() {
        use crate::zns::MemZns;

        let g = geo();
        let dev = MemZns::new(g.num_zones, g.blocks_per_zone, g.lba_size);
        let store = populated_store();

        save(&dev, &g, &store).unwrap();
        let data = restore(&dev, &g).unwrap().expect("checkpoint present");
        assert_eq!(data.log_zone_end, 5);
        assert_eq!(data.log_map.len(), 3);
        assert_eq!(data.data_map.len(), 2);

        // Rewriting replaces the record in place
        let mut store2 = MappingStore::new(g.num_zones);
        store2.data_set(4, 16);
        save(&dev, &g, &store2).unwrap();
        let data = restore(&dev, &g).unwrap().expect("checkpoint present");
        assert!(data.log_map.is_empty());
        assert_eq!(data.data_map, vec![(4, 16)]);
    }

    #[test]
    fn test_restore_fresh_device() {
        use crate::zns::MemZns;

        let g = geo();
        let dev = MemZns::new(g.num_zones, g.blocks_per_zone, g.lba_size);
        assert!(restore(&dev, &g).unwrap().is_none());
    }
}
