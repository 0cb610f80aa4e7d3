//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod index;
pub mod init;
pub mod packages;
pub mod serve;
pub mod status;

use std::sync::Arc;

use anyhow::Context;

use crate::atomic::AtomicWriter;
use crate::channel::Channel;
use crate::config::Settings;
use crate::index::{CommandIndexer, IndexCoordinator};

/// Open the configured channel, creating it if needed.
pub fn open_channel(settings: &Settings) -> anyhow::Result<Channel> {
    let writer = AtomicWriter::new(settings.locks.options());
    Channel::open(&settings.channel_dir, writer).with_context(|| {
        format!(
            "cannot open channel directory {}",
            settings.channel_dir.display()
        )
    })
}

/// Coordinator running the configured indexer command on `channel`.
pub fn coordinator_for(settings: &Settings, channel: &Channel) -> anyhow::Result<IndexCoordinator> {
    let indexer = CommandIndexer::new(&settings.index.command).context("invalid index.command")?;
    IndexCoordinator::new(channel.root(), Arc::new(indexer), settings.locks.options())
        .context("cannot coordinate index generation")
}
