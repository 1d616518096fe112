use std::path::Path;

use crate::disk::{DeviceType, DiskCore, DiskGeometry, HardDisk};
use crate::geometry::{BackingFile, Geometry, SectorRules, SizePolicy};
use crate::{sense, OpenError, Result};

pub const SASI_SECTOR_RULES: SectorRules = SectorRules {
    default_bytes: 256,
    supported: &[256, 1024],
};

/// SASI hard disk.
///
/// Geometry is fixed by the image size; INQUIRY and MODE SELECT do not exist on the SASI command
/// set and are answered with INVALID COMMAND.
#[derive(Debug, Clone, Default)]
pub struct SasiHd {
    disk: DiskCore,
    size_policy: SizePolicy,
}

impl SasiHd {
    /// `lun` is masked to its low three bits (`lun & MAX_LUN`). The size policy is the build-mode
    /// default, see [`SizePolicy::default`].
    pub fn new(lun: u8) -> Self {
        Self {
            disk: DiskCore::new(lun),
            size_policy: SizePolicy::default(),
        }
    }

    pub fn with_size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }

    pub fn with_sector_size(mut self, bytes: u32) -> Self {
        self.disk.set_configured_sector_size(bytes);
        self
    }

    pub fn size_policy(&self) -> SizePolicy {
        self.size_policy
    }

    fn validate(&self, path: &Path) -> Result<(Geometry, BackingFile)> {
        let file = BackingFile::probe(path)?;
        let sector_size = SASI_SECTOR_RULES.resolve(self.disk.configured_sector_size())?;
        let geometry = Geometry::from_file_size(file.size(), sector_size);
        self.size_policy.check(file.size(), sector_size)?;
        Ok((geometry, file))
    }
}

impl HardDisk for SasiHd {
    fn device_type(&self) -> DeviceType {
        DeviceType::Sahd
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
            tracing::warn!(path = %path.display(), policy = ?self.size_policy, "rejected SASI image: {err}");
        })?;

        tracing::info!(
            path = %file.path().display(),
            size = file.size(),
            sector_size = geometry.sector_size_bytes(),
            blocks = geometry.block_count(),
            "SASI image attached"
        );
        self.disk.commit(geometry, file);
        Ok(())
    }

    fn inquiry(&mut self, _cdb: &[u8]) -> Vec<u8> {
        sense::unsupported_command(self.disk.state_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileSupport, StatusCode};

    fn image(len: u64) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(len).unwrap();
        file
    }

    #[test]
    fn ten_megabyte_image_has_40788_blocks() {
        let img = image(0x9f_5400);
        let mut hd = SasiHd::new(0).with_size_policy(SizePolicy::Fixed);
        hd.open(img.path()).unwrap();

        assert!(hd.is_ready());
        assert_eq!(hd.disk().sector_size_bytes(), Some(256));
        assert_eq!(hd.disk().block_count(), 40788);
        assert_eq!(hd.disk().path(), Some(img.path()));
    }

    #[test]
    fn open_while_ready_is_refused_without_touching_the_mount() {
        let first = image(0x9f_5400);
        let second = image(0x13c_9800);
        let mut hd = SasiHd::new(0).with_size_policy(SizePolicy::Fixed);
        hd.open(first.path()).unwrap();

        let err = hd.open(second.path()).unwrap_err();
        assert!(matches!(err, OpenError::AlreadyOpen));
        assert_eq!(hd.disk().block_count(), 40788);

        hd.close();
        hd.open(second.path()).unwrap();
        assert_eq!(hd.disk().block_count(), 81048);
    }

    #[test]
    fn inquiry_is_not_part_of_the_sasi_command_set() {
        let mut hd = SasiHd::new(0);
        assert!(hd.inquiry(&[0x12, 0, 0, 0, 36, 0]).is_empty());
        assert_eq!(hd.state().status(), StatusCode::INVALID_COMMAND);
    }

    #[test]
    fn mode_select_and_vendor_pages_are_unsupported() {
        let mut hd = SasiHd::new(0);
        assert!(!hd.mode_select(&[0x15, 0x10, 0, 0, 12, 0], &[0u8; 12]));
        assert_eq!(hd.state().status(), StatusCode::INVALID_COMMAND);

        let mut buf = [0u8; 64];
        assert_eq!(hd.add_vendor_page(0x30, false, &mut buf), 0);
        assert!(buf.iter().all(|&b| b == 0));
    }
}
