//! Mount-time geometry derivation.
//!
//! A backing image is a flat byte array addressed by sector. Opening it only inspects its length:
//! the file handle is dropped before any policy check runs, so a rejected image never leaves a
//! handle behind.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{OpenError, Result};

/// Capacities accepted by the fixed-table SASI policy (10, 20 and 40 MB class drives).
///
/// - `0x9f5400`: 10441728 bytes, 40788 blocks of 256 bytes
/// - `0x13c9800`: 20748288 bytes, 81048 blocks
/// - `0x2793000`: 41496576 bytes, 162096 blocks
pub const SASI_FIXED_SIZES: &[u64] = &[0x9f_5400, 0x13c_9800, 0x279_3000];

/// Lower bound of the bounded-range SASI policy. Kept as the legacy literal.
pub const SASI_MIN_SIZE: u64 = 0x9f_5400;
pub const SASI_MAX_SIZE: u64 = 512 * 1024 * 1024;

pub const SCSI_SIZE_ALIGNMENT: u64 = 512;
pub const SCSI_MAX_SIZE: u64 = 2 * 1024 * 1024 * 1024 * 1024;

/// A power-of-two sector size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorSize(u32);

impl SectorSize {
    /// Accepts `bytes` only if it appears in `supported`. Every supported set is made of powers
    /// of two; anything else is rejected regardless.
    pub fn new(bytes: u32, supported: &'static [u32]) -> Result<Self> {
        if bytes.is_power_of_two() && supported.contains(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(OpenError::InvalidSectorSize { bytes, supported })
        }
    }

    pub const fn bytes(self) -> u32 {
        self.0
    }

    /// log2 of the sector size.
    pub const fn shift(self) -> u32 {
        self.0.trailing_zeros()
    }
}

/// Sector sizes a device variant understands plus the one it falls back to when unconfigured.
#[derive(Debug, Clone, Copy)]
pub struct SectorRules {
    pub default_bytes: u32,
    pub supported: &'static [u32],
}

impl SectorRules {
    /// A configured value of 0 means "use the variant default".
    pub fn resolve(&self, configured: u32) -> Result<SectorSize> {
        let bytes = if configured != 0 {
            configured
        } else {
            self.default_bytes
        };
        SectorSize::new(bytes, self.supported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    sector_size: SectorSize,
    block_count: u64,
}

impl Geometry {
    /// Any trailing partial sector is not addressable.
    pub fn from_file_size(file_size: u64, sector_size: SectorSize) -> Self {
        Self {
            sector_size,
            block_count: file_size >> sector_size.shift(),
        }
    }

    pub fn sector_size(&self) -> SectorSize {
        self.sector_size
    }

    pub fn sector_size_bytes(&self) -> u32 {
        self.sector_size.bytes()
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.block_count << self.sector_size.shift()
    }
}

/// Path and length of the image a device was mounted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingFile {
    path: PathBuf,
    size: u64,
}

impl BackingFile {
    /// Opens `path` read-only just long enough to read its length.
    pub fn probe(path: &Path) -> Result<Self> {
        let open_failure = |source| OpenError::OpenFailure {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_failure)?;
        let size = file.metadata().map_err(open_failure)?.len();
        drop(file);

        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// How a SASI drive decides whether an image has an acceptable size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePolicy {
    /// Only the three capacities in [`SASI_FIXED_SIZES`].
    #[serde(alias = "fixed-table")]
    Fixed,
    /// Any sector-aligned size in `SASI_MIN_SIZE..=SASI_MAX_SIZE`.
    #[serde(alias = "bounded-range")]
    Bounded,
}

impl Default for SizePolicy {
    fn default() -> Self {
        if cfg!(feature = "bounded-sasi-size") {
            SizePolicy::Bounded
        } else {
            SizePolicy::Fixed
        }
    }
}

impl SizePolicy {
    pub fn check(self, size: u64, sector_size: SectorSize) -> Result<()> {
        match self {
            SizePolicy::Bounded => {
                let sector_bytes = u64::from(sector_size.bytes());
                if size % sector_bytes != 0 {
                    return Err(OpenError::SizeNotMultiple {
                        size,
                        sector_size: sector_size.bytes(),
                    });
                }
                if size < SASI_MIN_SIZE {
                    return Err(OpenError::SizeTooSmall {
                        size,
                        min: SASI_MIN_SIZE,
                    });
                }
                if size > SASI_MAX_SIZE {
                    return Err(OpenError::SizeTooLarge {
                        size,
                        max: SASI_MAX_SIZE,
                    });
                }
                Ok(())
            }
            SizePolicy::Fixed => {
                if SASI_FIXED_SIZES.contains(&size) {
                    Ok(())
                } else {
                    Err(OpenError::UnsupportedFixedSize {
                        size,
                        supported: SASI_FIXED_SIZES,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpenErrorKind;

    const SASI_SECTORS: &[u32] = &[256, 1024];

    fn sector(bytes: u32) -> SectorSize {
        SectorSize::new(bytes, SASI_SECTORS).unwrap()
    }

    #[test]
    fn sector_size_rejects_unsupported_and_non_power_of_two() {
        assert_eq!(
            SectorSize::new(512, SASI_SECTORS).unwrap_err().kind(),
            OpenErrorKind::InvalidSectorSize
        );
        assert_eq!(
            SectorSize::new(300, &[300]).unwrap_err().kind(),
            OpenErrorKind::InvalidSectorSize
        );
        assert_eq!(sector(1024).shift(), 10);
    }

    #[test]
    fn zero_configured_sector_size_falls_back_to_default() {
        let rules = SectorRules {
            default_bytes: 256,
            supported: SASI_SECTORS,
        };
        assert_eq!(rules.resolve(0).unwrap().bytes(), 256);
        assert_eq!(rules.resolve(1024).unwrap().bytes(), 1024);
        assert!(rules.resolve(4096).is_err());
    }

    #[test]
    fn geometry_drops_trailing_partial_sector() {
        let geometry = Geometry::from_file_size(0x9f_5400 + 100, sector(256));
        assert_eq!(geometry.block_count(), 40788);
        assert_eq!(geometry.capacity_bytes(), 0x9f_5400);
    }

    #[test]
    fn fixed_table_accepts_exactly_three_sizes() {
        for &size in SASI_FIXED_SIZES {
            SizePolicy::Fixed.check(size, sector(256)).unwrap();
        }
        for size in [0, 0x9f_5400 - 256, 0x9f_5400 + 256, SASI_MAX_SIZE] {
            assert_eq!(
                SizePolicy::Fixed.check(size, sector(256)).unwrap_err().kind(),
                OpenErrorKind::UnsupportedFixedSize
            );
        }
    }

    #[test]
    fn bounded_range_checks_alignment_before_bounds() {
        // Unaligned and too small: alignment is reported first.
        assert_eq!(
            SizePolicy::Bounded.check(1000, sector(256)).unwrap_err().kind(),
            OpenErrorKind::SizeNotMultiple
        );
        assert_eq!(
            SizePolicy::Bounded.check(1024, sector(256)).unwrap_err().kind(),
            OpenErrorKind::SizeTooSmall
        );
        assert_eq!(
            SizePolicy::Bounded
                .check(SASI_MAX_SIZE + 1024, sector(1024))
                .unwrap_err()
                .kind(),
            OpenErrorKind::SizeTooLarge
        );
        SizePolicy::Bounded.check(SASI_MIN_SIZE, sector(256)).unwrap();
        SizePolicy::Bounded.check(SASI_MAX_SIZE, sector(1024)).unwrap();
    }

    #[test]
    fn default_policy_follows_build_mode() {
        let expected = if cfg!(feature = "bounded-sasi-size") {
            SizePolicy::Bounded
        } else {
            SizePolicy::Fixed
        };
        assert_eq!(SizePolicy::default(), expected);
    }

    #[test]
    fn size_policy_parses_from_config_names() {
        let policy: SizePolicy = serde_json::from_str("\"bounded-range\"").unwrap();
        assert_eq!(policy, SizePolicy::Bounded);
        let policy: SizePolicy = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(policy, SizePolicy::Fixed);
    }
}
