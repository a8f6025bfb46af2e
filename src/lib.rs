//! zoneftl - User-Space Flash Translation Layer for Zoned Namespaces
//!
//! NVMe Zoned Namespace devices expose storage as a linear array of zones
//! that accept only sequential writes and must be reset before rewrite.
//! zoneftl layers a conventional random-access block device on top: stable
//! logical addresses, arbitrary overwrites, block-aligned reads and writes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           ZonedFtl                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  write ──▶ append to log zones ──▶ log map (block granularity)   │
//! │  read  ──▶ log map ∪ data map  ──▶ physical block reads          │
//! │                                                                  │
//! │  merge worker: drains log zones into full data-zone images,      │
//! │  then resets the log region                                      │
//! │                                                                  │
//! │  metadata zone: checkpoint of both maps + zone states            │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ ZnsTransport
//!                             ▼
//!               zone_append / read / write / reset / report
//! ```
//!
//! The namespace is partitioned at init into log zones `[0, L)`, data zones
//! `[L, Z-1)`, and the reserved metadata zone `Z-1`. Exported capacity is
//! the data region only.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zoneftl::{FtlConfig, MemZns, ZonedFtl};
//!
//! let transport = Arc::new(MemZns::new(16, 64, 4096));
//! let config = FtlConfig {
//!     device: "mem0".to_string(),
//!     force_reset: true,
//!     ..Default::default()
//! };
//! let ftl = ZonedFtl::init(config, transport).unwrap();
//!
//! let data = vec![0xA5u8; 4096];
//! ftl.write(0, &data).unwrap();
//!
//! let mut out = vec![0u8; 4096];
//! ftl.read(0, &mut out).unwrap();
//! assert_eq!(out, data);
//!
//! ftl.close().unwrap();
//! ```
//!
//! # Modules
//!
//! - [`config`] - Device configuration
//! - [`error`] - Error types
//! - [`ftl`] - Translation core: mapping, write/read paths, merge, checkpoint
//! - [`zns`] - Transport trait, in-memory emulator, MDTS chunking

pub mod config;
pub mod error;
pub mod ftl;
pub mod zns;

pub use config::{FtlConfig, DEFAULT_GC_WATERMARK, DEFAULT_LOG_ZONES};
pub use error::{Error, Result};
pub use ftl::{DeviceInfo, FtlStatsSnapshot, Geometry, ZonedFtl, ZoneState};
pub use zns::{MemZns, ZnsTransport, ZoneDescriptor, ZoneStatus, DEFAULT_MDTS_BYTES};
