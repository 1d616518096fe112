//! Attach configuration for a single hard-disk unit.
//!
//! The management front-end describes a unit as a device type code, an image path, a LUN and a
//! few optional overrides. The JSON shape mirrors that request:
//!
//! ```json
//! { "type": "SCHD", "image": "/images/boot.hds", "lun": 0, "sector_size": 512 }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::SizePolicy;
use crate::scsi::{Identity, PRODUCT_LEN, REVISION_LEN, VENDOR_LEN};
use crate::state::MAX_LUN;
use crate::{DeviceType, HardDisk, OpenError, SasiHd, ScsiHd};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid device config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LUN {0} out of range (0..=7)")]
    InvalidLun(u8),

    #[error("{field} {value:?} is longer than {max} characters")]
    IdentityTooLong {
        field: &'static str,
        value: String,
        max: usize,
    },

    #[error("{field} {value:?} must be printable ASCII")]
    IdentityNotAscii { field: &'static str, value: String },

    #[error("{0} does not take INQUIRY identity overrides")]
    IdentityNotSupported(DeviceType),

    #[error(transparent)]
    Open(#[from] OpenError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "type")]
    pub kind: DeviceType,
    pub image: PathBuf,
    #[serde(default)]
    pub lun: u8,
    /// 0 or absent selects the variant default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_size: Option<u32>,
    /// Only consulted for SASI units.
    #[serde(default)]
    pub size_policy: SizePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl DeviceConfig {
    pub fn new(kind: DeviceType, image: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            image: image.into(),
            lun: 0,
            sector_size: None,
            size_policy: SizePolicy::default(),
            vendor: None,
            product: None,
            revision: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lun > MAX_LUN {
            return Err(ConfigError::InvalidLun(self.lun));
        }

        let has_identity =
            self.vendor.is_some() || self.product.is_some() || self.revision.is_some();
        if has_identity && self.kind == DeviceType::Sahd {
            return Err(ConfigError::IdentityNotSupported(self.kind));
        }

        check_identity_field("vendor", self.vendor.as_deref(), VENDOR_LEN)?;
        check_identity_field("product", self.product.as_deref(), PRODUCT_LEN)?;
        check_identity_field("revision", self.revision.as_deref(), REVISION_LEN)?;
        Ok(())
    }

    /// Constructs the device described by this config without attaching the image.
    pub fn build_device(&self) -> Result<Box<dyn HardDisk>, ConfigError> {
        self.validate()?;
        let sector_size = self.sector_size.unwrap_or(0);

        let device: Box<dyn HardDisk> = match self.kind {
            DeviceType::Sahd => Box::new(
                SasiHd::new(self.lun)
                    .with_size_policy(self.size_policy)
                    .with_sector_size(sector_size),
            ),
            DeviceType::Schd | DeviceType::Scrm => {
                let defaults = Identity::default();
                let identity = Identity {
                    vendor: self.vendor.clone().unwrap_or(defaults.vendor),
                    product: self.product.clone(),
                    revision: self.revision.clone().unwrap_or(defaults.revision),
                };
                Box::new(
                    ScsiHd::new(self.lun, self.kind == DeviceType::Scrm)
                        .with_identity(identity)
                        .with_sector_size(sector_size),
                )
            }
        };
        Ok(device)
    }

    /// Builds the device and opens the configured image on it.
    pub fn attach(&self) -> Result<Box<dyn HardDisk>, ConfigError> {
        let mut device = self.build_device()?;
        device.open(&self.image)?;
        Ok(device)
    }
}

fn check_identity_field(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        return Err(ConfigError::IdentityNotAscii {
            field,
            value: value.to_string(),
        });
    }
    if value.len() > max {
        return Err(ConfigError::IdentityTooLong {
            field,
            value: value.to_string(),
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() {
        let config = DeviceConfig::from_json_str(r#"{"type":"SAHD","image":"hd.hda"}"#).unwrap();
        assert_eq!(config.kind, DeviceType::Sahd);
        assert_eq!(config.lun, 0);
        assert_eq!(config.sector_size, None);
        assert_eq!(config.size_policy, SizePolicy::default());
    }

    #[test]
    fn lun_above_seven_is_rejected() {
        let err = DeviceConfig::from_json_str(r#"{"type":"SCHD","image":"a","lun":8}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLun(8)));
    }

    #[test]
    fn unknown_type_is_a_json_error() {
        let err = DeviceConfig::from_json_str(r#"{"type":"SCCD","image":"a"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn identity_fields_are_length_checked() {
        let mut config = DeviceConfig::new(DeviceType::Schd, "a");
        config.vendor = Some("TOO LONG VENDOR".to_string());
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::IdentityTooLong { field: "vendor", max: 8, .. }
        ));

        config.vendor = Some("QUANTUM".to_string());
        config.revision = Some("1\u{e9}".to_string());
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::IdentityNotAscii { field: "revision", .. }
        ));
    }

    #[test]
    fn sasi_refuses_identity_overrides() {
        let mut config = DeviceConfig::new(DeviceType::Sahd, "a");
        config.product = Some("X".to_string());
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::IdentityNotSupported(DeviceType::Sahd)
        ));
    }

    #[test]
    fn build_device_selects_the_variant() {
        let sasi = DeviceConfig::new(DeviceType::Sahd, "a").build_device().unwrap();
        assert_eq!(sasi.device_type(), DeviceType::Sahd);
        let removable = DeviceConfig::new(DeviceType::Scrm, "a").build_device().unwrap();
        assert_eq!(removable.device_type(), DeviceType::Scrm);
        assert!(!removable.is_ready());
    }
}
