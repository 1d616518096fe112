use core::fmt;
use core::str::FromStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::{BackingFile, Geometry};
use crate::{sense, DeviceState, Result};

/// Device type codes as used by the attach/management protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// SASI hard disk.
    #[serde(rename = "SAHD")]
    Sahd,
    /// SCSI hard disk.
    #[serde(rename = "SCHD")]
    Schd,
    /// Removable SCSI hard disk.
    #[serde(rename = "SCRM")]
    Scrm,
}

impl DeviceType {
    pub const fn code(self) -> &'static str {
        match self {
            DeviceType::Sahd => "SAHD",
            DeviceType::Schd => "SCHD",
            DeviceType::Scrm => "SCRM",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDeviceType(pub String);

impl fmt::Display for UnknownDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown device type {:?}", self.0)
    }
}

impl std::error::Error for UnknownDeviceType {}

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAHD" => Ok(DeviceType::Sahd),
            "SCHD" => Ok(DeviceType::Schd),
            "SCRM" => Ok(DeviceType::Scrm),
            _ => Err(UnknownDeviceType(s.to_string())),
        }
    }
}

/// Sector geometry of an attached image.
pub trait DiskGeometry {
    /// `None` until an image has been opened.
    fn geometry(&self) -> Option<&Geometry>;

    /// Sector size requested by configuration; 0 selects the variant default on the next open.
    fn configured_sector_size(&self) -> u32;
    fn set_configured_sector_size(&mut self, bytes: u32);

    fn sector_size_bytes(&self) -> Option<u32> {
        self.geometry().map(Geometry::sector_size_bytes)
    }

    fn block_count(&self) -> u64 {
        self.geometry().map_or(0, Geometry::block_count)
    }
}

/// Association between a device and the host file it was mounted from.
pub trait FileSupport {
    fn backing_file(&self) -> Option<&BackingFile>;

    fn path(&self) -> Option<&Path> {
        self.backing_file().map(BackingFile::path)
    }
}

/// State every hard-disk variant carries: the flags the dispatcher manipulates plus whatever the
/// last successful open committed.
#[derive(Debug, Clone, Default)]
pub struct DiskCore {
    state: DeviceState,
    configured_sector_size: u32,
    geometry: Option<Geometry>,
    file: Option<BackingFile>,
}

impl DiskCore {
    pub fn new(lun: u8) -> Self {
        Self {
            state: DeviceState::new(lun),
            ..Self::default()
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// Commits a validated mount. Nothing is touched before this point so failed opens leave the
    /// device exactly as it was.
    pub(crate) fn commit(&mut self, geometry: Geometry, file: BackingFile) {
        self.geometry = Some(geometry);
        self.file = Some(file);
        self.state.set_ready(true);
    }

    pub(crate) fn detach(&mut self) {
        self.geometry = None;
        self.file = None;
        self.state.set_ready(false);
    }
}

impl DiskGeometry for DiskCore {
    fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    fn configured_sector_size(&self) -> u32 {
        self.configured_sector_size
    }

    fn set_configured_sector_size(&mut self, bytes: u32) {
        self.configured_sector_size = bytes;
    }
}

impl FileSupport for DiskCore {
    fn backing_file(&self) -> Option<&BackingFile> {
        self.file.as_ref()
    }
}

/// Capability surface a drive variant exposes to the command dispatcher.
///
/// The dispatcher serializes calls per device; every method runs to completion without blocking
/// on anything but the `open` size probe.
pub trait HardDisk: Send {
    fn device_type(&self) -> DeviceType;

    fn disk(&self) -> &DiskCore;
    fn disk_mut(&mut self) -> &mut DiskCore;

    /// Validates `path` against the variant's size rules and attaches it.
    ///
    /// Must be called while not ready; on error the device is left untouched.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// INQUIRY. The returned buffer is the data-in payload; an empty buffer means the command was
    /// rejected and the reason is latched in the status code.
    fn inquiry(&mut self, cdb: &[u8]) -> Vec<u8>;

    fn state(&self) -> &DeviceState {
        self.disk().state()
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        self.disk_mut().state_mut()
    }

    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn reset(&mut self) {
        tracing::debug!(device = %self.device_type(), "bus reset");
        self.state_mut().reset();
    }

    /// Detaches the image. Idempotent.
    fn close(&mut self) {
        if self.is_ready() {
            tracing::debug!(device = %self.device_type(), "image detached");
        }
        self.disk_mut().detach();
    }

    /// REQUEST SENSE in the fixed, non-extended format.
    fn request_sense(&mut self, cdb: &[u8]) -> Vec<u8> {
        sense::request_sense(self.state(), cdb)
    }

    /// MODE SELECT. Returns `false` if the parameters were rejected.
    fn mode_select(&mut self, _cdb: &[u8], _params: &[u8]) -> bool {
        sense::unsupported_command(self.state_mut());
        false
    }

    /// Fills a vendor-specific mode page into `buf` and returns its length, or 0 if the page is
    /// not provided.
    fn add_vendor_page(&self, _page: u8, _changeable: bool, _buf: &mut [u8]) -> usize {
        0
    }
}
