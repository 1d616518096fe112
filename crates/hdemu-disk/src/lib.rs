//! Hard-disk device variants for a SASI/SCSI target emulator.
//!
//! A variant turns a flat host image into a direct-access device: [`HardDisk::open`] derives the
//! sector geometry from the image length under the variant's size rules, and the command hooks
//! ([`HardDisk::inquiry`], [`HardDisk::request_sense`], ...) produce the fixed-layout buffers the
//! command dispatcher forwards to the host.
//!
//! - [`SasiHd`]: SASI drive. Fixed 10/20/40 MB capacities (or a bounded range with the
//!   `bounded-sasi-size` feature), no INQUIRY.
//! - [`ScsiHd`]: SCSI drive, optionally removable. Adds INQUIRY, MODE SELECT and the Apple vendor
//!   mode page.
//!
//! Bus phases, command decoding and data transfer belong to the dispatcher and are not modelled
//! here.

mod config;
mod disk;
mod error;
pub mod geometry;
mod sasi;
mod scsi;
pub mod sense;
mod state;
mod status;

pub use config::{ConfigError, DeviceConfig};
pub use disk::{DeviceType, DiskCore, DiskGeometry, FileSupport, HardDisk, UnknownDeviceType};
pub use error::{OpenError, OpenErrorKind, Result};
pub use geometry::{BackingFile, Geometry, SectorSize, SizePolicy};
pub use sasi::{SasiHd, SASI_SECTOR_RULES};
pub use scsi::{Identity, ScsiHd, SCSI_SECTOR_RULES};
pub use state::{DeviceState, MAX_LUN};
pub use status::StatusCode;
