use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpenError>;

/// Reasons a backing image was refused at mount time.
///
/// Every variant is terminal for the mount attempt: the device stays not-ready and the caller has
/// to supply a different image or configuration.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("can't open hard disk file {} read-only: {source}", .path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid sector size {bytes} (supported: {supported:?})")]
    InvalidSectorSize {
        bytes: u32,
        supported: &'static [u32],
    },

    #[error("file size must be a multiple of {sector_size} bytes but is {size} bytes")]
    SizeNotMultiple { size: u64, sector_size: u32 },

    #[error("file size {size} is below the minimum of {min} bytes")]
    SizeTooSmall { size: u64, min: u64 },

    #[error("file size {size} exceeds the maximum of {max} bytes")]
    SizeTooLarge { size: u64, max: u64 },

    #[error("unsupported file size {size} (expected one of {supported:?})")]
    UnsupportedFixedSize {
        size: u64,
        supported: &'static [u64],
    },

    /// The device already has an image attached; `close` it first.
    #[error("device already has an image attached")]
    AlreadyOpen,
}

/// Fieldless mirror of [`OpenError`] for callers that only need to branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenErrorKind {
    OpenFailure,
    InvalidSectorSize,
    SizeNotMultiple,
    SizeTooSmall,
    SizeTooLarge,
    UnsupportedFixedSize,
    AlreadyOpen,
}

impl OpenError {
    pub fn kind(&self) -> OpenErrorKind {
        match self {
            OpenError::OpenFailure { .. } => OpenErrorKind::OpenFailure,
            OpenError::InvalidSectorSize { .. } => OpenErrorKind::InvalidSectorSize,
            OpenError::SizeNotMultiple { .. } => OpenErrorKind::SizeNotMultiple,
            OpenError::SizeTooSmall { .. } => OpenErrorKind::SizeTooSmall,
            OpenError::SizeTooLarge { .. } => OpenErrorKind::SizeTooLarge,
            OpenError::UnsupportedFixedSize { .. } => OpenErrorKind::UnsupportedFixedSize,
            OpenError::AlreadyOpen => OpenErrorKind::AlreadyOpen,
        }
    }
}
