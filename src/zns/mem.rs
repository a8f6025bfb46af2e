//! In-memory Zoned Namespace emulator.
//!
//! `MemZns` implements [`ZnsTransport`] over a heap buffer while keeping the
//! semantics that make ZNS devices awkward: writes land only at a zone's
//! write pointer, appends succeed atomically or not at all, a full zone must
//! be reset before it accepts data again, and no single command may move
//! more than the MDTS. It backs the test suite and the CLI so the
//! translation layer can be exercised without hardware.

use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::{ZnsTransport, ZoneDescriptor, ZoneStatus, DEFAULT_MDTS_BYTES};

#[derive(Debug, Clone, Copy)]
struct ZoneCell {
    /// Write pointer, blocks from the zone start
    wp: u64,
    status: ZoneStatus,
}

struct MemState {
    data: Vec<u8>,
    zones: Vec<ZoneCell>,
}

/// Emulated ZNS namespace held in memory.
pub struct MemZns {
    lba_size: u64,
    num_zones: u64,
    blocks_per_zone: u64,
    mdts_bytes: u64,
    state: Mutex<MemState>,
}

impl MemZns {
    /// Create an emulated namespace with the default MDTS.
    pub fn new(num_zones: u64, blocks_per_zone: u64, lba_size: u64) -> Self {
        Self::with_mdts(num_zones, blocks_per_zone, lba_size, DEFAULT_MDTS_BYTES)
    }

    /// Create an emulated namespace with an explicit MDTS in bytes.
    pub fn with_mdts(num_zones: u64, blocks_per_zone: u64, lba_size: u64, mdts_bytes: u64) -> Self {
        assert!(lba_size.is_power_of_two(), "lba_size must be a power of 2");
        assert!(num_zones > 0 && blocks_per_zone > 0);
        assert!(
            mdts_bytes >= lba_size && mdts_bytes % lba_size == 0,
            "mdts must be a positive multiple of lba_size"
        );

        let total = (num_zones * blocks_per_zone * lba_size) as usize;
        Self {
            lba_size,
            num_zones,
            blocks_per_zone,
            mdts_bytes,
            state: Mutex::new(MemState {
                data: vec![0u8; total],
                zones: vec![
                    ZoneCell {
                        wp: 0,
                        status: ZoneStatus::Empty,
                    };
                    num_zones as usize
                ],
            }),
        }
    }

    fn check_buf(&self, op: &'static str, lba: u64, buf_len: usize) -> Result<u64> {
        let len = buf_len as u64;
        if len == 0 || len % self.lba_size != 0 {
            return Err(Error::Alignment {
                op,
                addr: lba * self.lba_size,
                size: len,
                lba_size: self.lba_size,
            });
        }
        if len > self.mdts_bytes {
            return Err(Error::device_io(
                op,
                lba,
                format!("transfer of {} bytes exceeds mdts {}", len, self.mdts_bytes),
            ));
        }
        let blocks = len / self.lba_size;
        if lba + blocks > self.num_zones * self.blocks_per_zone {
            return Err(Error::device_io(op, lba, "lba range out of bounds"));
        }
        Ok(blocks)
    }

    fn zone_of(&self, lba: u64) -> u64 {
        lba / self.blocks_per_zone
    }
}

impl ZnsTransport for MemZns {
    fn lba_size(&self) -> u64 {
        self.lba_size
    }

    fn num_zones(&self) -> u64 {
        self.num_zones
    }

    fn zone_capacity(&self) -> u64 {
        self.blocks_per_zone
    }

    fn mdts_bytes(&self) -> u64 {
        self.mdts_bytes
    }

    fn zone_append(&self, zslba: u64, buf: &[u8]) -> Result<u64> {
        let blocks = self.check_buf("zone_append", zslba, buf.len())?;
        if zslba % self.blocks_per_zone != 0 {
            return Err(Error::device_io(
                "zone_append",
                zslba,
                "zslba is not a zone start",
            ));
        }

        let mut state = self.state.lock();
        let zone = self.zone_of(zslba);
        let cell = state.zones[zone as usize];
        if cell.wp + blocks > self.blocks_per_zone {
            return Err(Error::ZoneOverflow {
                zone,
                wp: cell.wp,
                capacity: self.blocks_per_zone,
            });
        }

        let res_lba = zslba + cell.wp;
        let byte_off = (res_lba * self.lba_size) as usize;
        state.data[byte_off..byte_off + buf.len()].copy_from_slice(buf);

        let cell = &mut state.zones[zone as usize];
        cell.wp += blocks;
        cell.status = if cell.wp == self.blocks_per_zone {
            ZoneStatus::Full
        } else {
            ZoneStatus::Open
        };
        Ok(res_lba)
    }

    fn read_lbas(&self, slba: u64, buf: &mut [u8]) -> Result<()> {
        self.check_buf("read", slba, buf.len())?;
        let state = self.state.lock();
        let byte_off = (slba * self.lba_size) as usize;
        buf.copy_from_slice(&state.data[byte_off..byte_off + buf.len()]);
        Ok(())
    }

    fn write_lbas(&self, slba: u64, buf: &[u8]) -> Result<()> {
        let blocks = self.check_buf("write", slba, buf.len())?;
        let mut state = self.state.lock();

        // Sequential-write rule: the command must land on the zone's write
        // pointer and stay inside the zone.
        let zone = self.zone_of(slba);
        let cell = state.zones[zone as usize];
        let zone_start = zone * self.blocks_per_zone;
        if slba != zone_start + cell.wp {
            return Err(Error::device_io(
                "write",
                slba,
                format!("write pointer violation (wp at 0x{:x})", zone_start + cell.wp),
            ));
        }
        if cell.wp + blocks > self.blocks_per_zone {
            return Err(Error::ZoneOverflow {
                zone,
                wp: cell.wp,
                capacity: self.blocks_per_zone,
            });
        }

        let byte_off = (slba * self.lba_size) as usize;
        state.data[byte_off..byte_off + buf.len()].copy_from_slice(buf);

        let cell = &mut state.zones[zone as usize];
        cell.wp += blocks;
        cell.status = if cell.wp == self.blocks_per_zone {
            ZoneStatus::Full
        } else {
            ZoneStatus::Open
        };
        Ok(())
    }

    fn zone_reset(&self, zslba: u64) -> Result<()> {
        if zslba % self.blocks_per_zone != 0 || self.zone_of(zslba) >= self.num_zones {
            return Err(Error::device_io(
                "zone_reset",
                zslba,
                "zslba is not a zone start",
            ));
        }
        let mut state = self.state.lock();
        let zone = self.zone_of(zslba) as usize;
        let byte_off = (zslba * self.lba_size) as usize;
        let zone_bytes = (self.blocks_per_zone * self.lba_size) as usize;
        // Deallocated blocks read back as zeros
        state.data[byte_off..byte_off + zone_bytes].fill(0);
        state.zones[zone] = ZoneCell {
            wp: 0,
            status: ZoneStatus::Empty,
        };
        Ok(())
    }

    fn zone_reset_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.data.fill(0);
        for cell in &mut state.zones {
            *cell = ZoneCell {
                wp: 0,
                status: ZoneStatus::Empty,
            };
        }
        Ok(())
    }

    fn zone_report(&self) -> Result<Vec<ZoneDescriptor>> {
        let state = self.state.lock();
        Ok(state
            .zones
            .iter()
            .enumerate()
            .map(|(i, cell)| ZoneDescriptor {
                start_lba: i as u64 * self.blocks_per_zone,
                capacity: self.blocks_per_zone,
                write_pointer: cell.wp,
                status: cell.status,
            })
            .collect())
    }
}
