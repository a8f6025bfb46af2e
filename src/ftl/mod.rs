//! Log-structured translation core.
//!
//! This module turns the append-only zone model into a conventional block
//! device:
//!
//! ```text
//!              write(addr, buf)                 read(addr, buf)
//!                     │                                │
//!                     ▼                                ▼
//!            ┌─────────────────┐             ┌──────────────────┐
//!            │   Write Path    │             │    Read Path     │
//!            │ zone-append into│             │ log map, then    │
//!            │ the log region  │             │ data map, then   │
//!            └────────┬────────┘             │ zero fill        │
//!                     │                      └──────────────────┘
//!            watermark reached?
//!                     │ signal
//!                     ▼
//!            ┌─────────────────┐   full-zone   ┌────────────────┐
//!            │  Merge Worker   │ ────writes──▶ │   Data Zones   │
//!            │ stage + overlay │               └────────────────┘
//!            └────────┬────────┘
//!                     │ reset
//!                     ▼
//!              Log Zones [0, L)
//! ```
//!
//! The mapping state is checkpointed into the reserved last zone at close
//! and restored at init.

pub mod device;
pub mod geometry;
pub mod mapping;
pub mod stats;

mod checkpoint;
mod gc;

#[cfg(test)]
mod proptest;

pub use device::{DeviceInfo, ZonedFtl};
pub use geometry::Geometry;
pub use mapping::{LogSlot, MappingStore, ZoneState};
pub use stats::{FtlStats, FtlStatsSnapshot};
