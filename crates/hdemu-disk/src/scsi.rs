use std::path::Path;

use crate::disk::{DeviceType, DiskCore, DiskGeometry, HardDisk};
use crate::geometry::{BackingFile, Geometry, SectorRules, SCSI_MAX_SIZE, SCSI_SIZE_ALIGNMENT};
use crate::sense::allocation_length;
use crate::{OpenError, Result, StatusCode};

pub const SCSI_SECTOR_RULES: SectorRules = SectorRules {
    default_bytes: 512,
    supported: &[512, 1024, 2048, 4096],
};

pub const VENDOR_LEN: usize = 8;
pub const PRODUCT_LEN: usize = 16;
pub const REVISION_LEN: usize = 4;

const INQUIRY_LEN: usize = 36;
const INQUIRY_EVPD: u8 = 0x01;
const MODE_SELECT_PF: u8 = 0x10;
const MODE_PARAMETER_HEADER_LEN: usize = 12;

const PAGE_FORMAT_DEVICE: u8 = 0x03;
const PAGE_APPLE_VENDOR: u8 = 0x30;
const PAGE_ALL: u8 = 0x3f;
const APPLE_VENDOR_PAGE_LEN: usize = 30;
const APPLE_VENDOR_SIGNATURE: &[u8; 20] = b"APPLE COMPUTER, INC.";

const DEFAULT_PRODUCT: &str = "SCSI HD";

/// INQUIRY vendor/product/revision strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub vendor: String,
    /// `None` derives a product name from the image capacity at open time.
    pub product: Option<String>,
    pub revision: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            vendor: "HDEMU".to_string(),
            product: None,
            revision: "0100".to_string(),
        }
    }
}

/// SCSI hard disk (fixed or removable).
#[derive(Debug, Clone)]
pub struct ScsiHd {
    disk: DiskCore,
    removable: bool,
    identity: Identity,
    product: String,
}

impl ScsiHd {
    /// `lun` is masked to its low three bits (`lun & MAX_LUN`), so `ScsiHd::new(9, false)` answers
    /// as LUN 1.
    pub fn new(lun: u8, removable: bool) -> Self {
        Self {
            disk: DiskCore::new(lun),
            removable,
            identity: Identity::default(),
            product: DEFAULT_PRODUCT.to_string(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        if let Some(product) = &identity.product {
            self.product = product.clone();
        }
        self.identity = identity;
        self
    }

    pub fn with_sector_size(mut self, bytes: u32) -> Self {
        self.disk.set_configured_sector_size(bytes);
        self
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn vendor(&self) -> &str {
        &self.identity.vendor
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn revision(&self) -> &str {
        &self.identity.revision
    }

    fn validate(&self, path: &Path) -> Result<(Geometry, BackingFile)> {
        let file = BackingFile::probe(path)?;
        let size = file.size();
        if size % SCSI_SIZE_ALIGNMENT != 0 {
            return Err(OpenError::SizeNotMultiple {
                size,
                sector_size: SCSI_SIZE_ALIGNMENT as u32,
            });
        }
        if size > SCSI_MAX_SIZE {
            return Err(OpenError::SizeTooLarge {
                size,
                max: SCSI_MAX_SIZE,
            });
        }
        let sector_size = SCSI_SECTOR_RULES.resolve(self.disk.configured_sector_size())?;
        Ok((Geometry::from_file_size(size, sector_size), file))
    }

    fn current_sector_size(&self) -> u32 {
        self.disk
            .sector_size_bytes()
            .unwrap_or(SCSI_SECTOR_RULES.default_bytes)
    }

    fn reject_parameters(&mut self) -> bool {
        self.disk.state_mut().set_status(StatusCode::INVALID_PARAMETER);
        false
    }
}

impl HardDisk for ScsiHd {
    fn device_type(&self) -> DeviceType {
        if self.removable {
            DeviceType::Scrm
        } else {
            DeviceType::Schd
        }
    }

    fn disk(&self) -> &DiskCore {
        &self.disk
    }

    fn disk_mut(&mut self) -> &mut DiskCore {
        &mut self.disk
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        if self.disk.state().is_ready() {
            return Err(OpenError::AlreadyOpen);
        }

        let (geometry, file) = self.validate(path).inspect_err(|err| {
            tracing::warn!(path = %path.display(), device = %self.device_type(), "rejected SCSI image: {err}");
        })?;

        if self.identity.product.is_none() {
            self.product = capacity_product_name(geometry.capacity_bytes());
        }

        tracing::info!(
            path = %file.path().display(),
            device = %self.device_type(),
            size = file.size(),
            sector_size = geometry.sector_size_bytes(),
            blocks = geometry.block_count(),
            product = %self.product,
            "SCSI image attached"
        );
        self.disk.commit(geometry, file);
        Ok(())
    }

    fn inquiry(&mut self, cdb: &[u8]) -> Vec<u8> {
        let flags = cdb.get(1).copied().unwrap_or(0);
        if flags & INQUIRY_EVPD != 0 {
            self.disk.state_mut().set_status(StatusCode::INVALID_CDB);
            return Vec::new();
        }
        if !self.disk.state().is_ready() {
            self.disk.state_mut().set_status(StatusCode::NOT_READY);
            return Vec::new();
        }

        let mut data = vec![0u8; INQUIRY_LEN];
        data[0] = 0x00; // direct-access device
        if self.removable {
            data[1] = 0x80;
        }
        data[2] = 0x02; // SCSI-2
        data[3] = 0x02; // response data format
        data[4] = (INQUIRY_LEN - 5) as u8;
        write_scsi_ascii(&mut data[8..16], self.identity.vendor.as_bytes());
        write_scsi_ascii(&mut data[16..32], self.product.as_bytes());
        write_scsi_ascii(&mut data[32..36], self.identity.revision.as_bytes());

        data.truncate(allocation_length(cdb));
        data
    }

    fn mode_select(&mut self, cdb: &[u8], params: &[u8]) -> bool {
        let flags = cdb.get(1).copied().unwrap_or(0);
        if flags & MODE_SELECT_PF != 0 {
            let sector_size = self.current_sector_size();
            let mut pages = params;

            if pages.len() >= MODE_PARAMETER_HEADER_LEN {
                // Block descriptor block length; changing the sector size is not supported.
                let block_len = u32::from_be_bytes([0, pages[9], pages[10], pages[11]]);
                if block_len != sector_size {
                    return self.reject_parameters();
                }
                pages = &pages[MODE_PARAMETER_HEADER_LEN..];
            }

            while pages.len() >= 2 {
                let page = pages[0] & 0x3f;
                let page_len = usize::from(pages[1]) + 2;

                match page {
                    PAGE_FORMAT_DEVICE => {
                        // Bytes per physical sector.
                        let Some(bytes) = pages.get(12..14) else {
                            return self.reject_parameters();
                        };
                        if u32::from(u16::from_be_bytes([bytes[0], bytes[1]])) != sector_size {
                            return self.reject_parameters();
                        }
                    }
                    _ => {
                        tracing::debug!(page, page_len, "ignoring unhandled MODE SELECT page");
                    }
                }

                if page_len >= pages.len() {
                    break;
                }
                pages = &pages[page_len..];
            }
        }

        self.disk.state_mut().set_status(StatusCode::NO_ERROR);
        true
    }

    fn add_vendor_page(&self, page: u8, changeable: bool, buf: &mut [u8]) -> usize {
        if page != PAGE_APPLE_VENDOR && page != PAGE_ALL {
            return 0;
        }
        if buf.len() < APPLE_VENDOR_PAGE_LEN {
            return 0;
        }

        buf[0] = PAGE_APPLE_VENDOR;
        buf[1] = (APPLE_VENDOR_PAGE_LEN - 2) as u8;
        if !changeable {
            buf[10..30].copy_from_slice(APPLE_VENDOR_SIGNATURE);
        }
        APPLE_VENDOR_PAGE_LEN
    }
}

/// Space-pads (or truncates) `src` into a fixed-width INQUIRY field.
fn write_scsi_ascii(dst: &mut [u8], src: &[u8]) {
    dst.fill(b' ');
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

fn capacity_product_name(capacity_bytes: u64) -> String {
    let mb = capacity_bytes >> 20;
    if mb >= 10_000 {
        format!("{DEFAULT_PRODUCT} {} GB", mb >> 10)
    } else if mb == 0 {
        format!("{DEFAULT_PRODUCT} {} KB", capacity_bytes.div_ceil(1024))
    } else {
        format!("{DEFAULT_PRODUCT} {mb} MB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_fields_are_space_padded_and_truncated() {
        let mut field = [0u8; 8];
        write_scsi_ascii(&mut field, b"ABC");
        assert_eq!(&field, b"ABC     ");
        write_scsi_ascii(&mut field, b"0123456789");
        assert_eq!(&field, b"01234567");
    }

    #[test]
    fn product_name_tracks_capacity() {
        assert_eq!(capacity_product_name(40 * 1024 * 1024), "SCSI HD 40 MB");
        assert_eq!(capacity_product_name(20 * 1024 * 1024 * 1024), "SCSI HD 20 GB");
        assert_eq!(capacity_product_name(512 * 1024), "SCSI HD 512 KB");
        assert_eq!(capacity_product_name(512), "SCSI HD 1 KB");
        assert_eq!(capacity_product_name(1024 * 1024), "SCSI HD 1 MB");
    }

    #[test]
    fn vendor_page_only_answers_apple_and_all_pages() {
        let hd = ScsiHd::new(0, false);
        let mut buf = [0u8; 64];
        assert_eq!(hd.add_vendor_page(0x01, false, &mut buf), 0);

        assert_eq!(hd.add_vendor_page(0x3f, true, &mut buf), 30);
        assert_eq!(&buf[..2], &[0x30, 0x1c]);
        assert!(buf[2..30].iter().all(|&b| b == 0));

        assert_eq!(hd.add_vendor_page(0x30, false, &mut buf), 30);
        assert_eq!(&buf[10..30], b"APPLE COMPUTER, INC.");
    }

    #[test]
    fn vendor_page_needs_room_for_the_whole_page() {
        let hd = ScsiHd::new(0, false);
        let mut buf = [0u8; 29];
        assert_eq!(hd.add_vendor_page(0x30, false, &mut buf), 0);
    }
}
