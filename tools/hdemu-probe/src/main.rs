#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use hdemu_disk::{
    DeviceConfig, DeviceType, DiskGeometry as _, FileSupport as _, HardDisk as _, SizePolicy,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "hdemu-probe",
    version,
    about = "Mount a hard-disk image as a SASI/SCSI unit and report the derived geometry."
)]
struct Args {
    /// Image path (overrides `image` from --config)
    image: Option<PathBuf>,

    /// JSON device config (`{"type": "SCHD", "image": "...", ...}`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device type code: SAHD, SCHD or SCRM
    #[arg(long = "type", value_name = "CODE")]
    kind: Option<DeviceType>,

    /// Logical unit number (0-7)
    #[arg(long)]
    lun: Option<u8>,

    /// Sector size in bytes (0 selects the variant default)
    #[arg(long, value_name = "BYTES")]
    sector_size: Option<u32>,

    /// Accept any SASI image between 0x9f5400 bytes and 512 MiB (SAHD only)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    bounded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    #[serde(rename = "type")]
    kind: DeviceType,
    path: PathBuf,
    lun: u8,
    file_size: u64,
    sector_size: u32,
    block_count: u64,
    /// REQUEST SENSE with a zero allocation length right after mount.
    sense: Vec<u8>,
}

fn load_config(args: &Args) -> anyhow::Result<DeviceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            DeviceConfig::from_json_str(&json)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => {
            let Some(image) = &args.image else {
                bail!("an image path or --config is required");
            };
            DeviceConfig::new(args.kind.unwrap_or(DeviceType::Sahd), image)
        }
    };

    if let Some(image) = &args.image {
        config.image = image.clone();
    }
    if let Some(kind) = args.kind {
        config.kind = kind;
    }
    if let Some(lun) = args.lun {
        config.lun = lun;
    }
    if let Some(sector_size) = args.sector_size {
        config.sector_size = Some(sector_size);
    }
    if args.bounded {
        if config.kind != DeviceType::Sahd {
            bail!("--bounded only applies to SAHD units, not {}", config.kind);
        }
        config.size_policy = SizePolicy::Bounded;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(?config, "probing image");

    let mut device = config.attach().with_context(|| {
        format!("failed to attach {} as {}", config.image.display(), config.kind)
    })?;

    let sense = device.request_sense(&[0x03, 0, 0, 0, 0, 0]);
    let disk = device.disk();
    let Some(file) = disk.backing_file() else {
        bail!("device reported ready without a backing file");
    };
    let report = ProbeReport {
        kind: device.device_type(),
        path: file.path().to_path_buf(),
        lun: device.state().lun(),
        file_size: file.size(),
        sector_size: disk.sector_size_bytes().unwrap_or(0),
        block_count: disk.block_count(),
        sense,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
