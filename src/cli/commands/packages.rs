//! Upload, delete, hash and list commands.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, anyhow};

use crate::config::Settings;

use super::open_channel;

pub fn run_upload(
    settings: &Settings,
    platform: &str,
    file: &Path,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot derive a package name from {}", file.display()))?,
    };

    let channel = open_channel(settings)?;
    let mut source =
        File::open(file).with_context(|| format!("cannot read {}", file.display()))?;
    let written = channel.upload(platform, &name, &mut source)?;

    println!("Uploaded {platform}/{name} ({written} bytes)");
    Ok(())
}

pub fn run_delete(settings: &Settings, platform: &str, file_name: &str) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    channel.delete(platform, file_name)?;
    println!("Deleted {platform}/{file_name}");
    Ok(())
}

pub fn run_hash(
    settings: &Settings,
    platform: &str,
    file_name: &str,
    md5: bool,
) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    let digest = if md5 {
        channel.md5(platform, file_name)?
    } else {
        channel.sha256(platform, file_name)?
    };
    println!("{digest}  {platform}/{file_name}");
    Ok(())
}

pub fn run_list(settings: &Settings, platform: &str) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    for name in channel.packages(platform)? {
        println!("{name}");
    }
    Ok(())
}
