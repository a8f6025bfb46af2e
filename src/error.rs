//! Error types for the zoneftl crate.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the translation layer and its transports.
#[derive(Error, Debug)]
pub enum Error {
    /// Request size or address not aligned to the device block size
    #[error("{op} of {size} bytes at 0x{addr:x} is not {lba_size}-byte block aligned")]
    Alignment {
        op: &'static str,
        addr: u64,
        size: u64,
        lba_size: u64,
    },

    /// Logical address range falls outside the exported capacity
    #[error("address range 0x{addr:x}+{size} exceeds device capacity {capacity}")]
    OutOfRange { addr: u64, size: u64, capacity: u64 },

    /// Underlying device command failed
    #[error("device {op} failed at lba 0x{lba:x}: {detail}")]
    DeviceIo {
        op: &'static str,
        lba: u64,
        detail: String,
    },

    /// No empty data zone remains and the log scratch path is unusable
    #[error("no empty data zone available for merge and no prior image to rewrite")]
    CapacityExhausted,

    /// A single write can never fit the log region, even fully drained
    #[error("write of {blocks} blocks exceeds the {max_blocks}-block log budget")]
    WriteTooLarge { blocks: u64, max_blocks: u64 },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Zone append or sequential write past the zone capacity
    #[error("write to zone {zone} at wp {wp} overflows its {capacity}-block capacity")]
    ZoneOverflow { zone: u64, wp: u64, capacity: u64 },

    /// I/O error from a file-backed transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `DeviceIo` error for a failed transport command.
    pub fn device_io(op: &'static str, lba: u64, detail: impl Into<String>) -> Self {
        Error::DeviceIo {
            op,
            lba,
            detail: detail.into(),
        }
    }
}
