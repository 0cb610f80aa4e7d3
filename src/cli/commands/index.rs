//! Index command - one regeneration, in the foreground.

use anyhow::bail;

use crate::config::Settings;
use crate::index::Scheduled;

use super::{coordinator_for, open_channel};

/// Run index command.
///
/// If another process is already indexing, the request joins its queue and
/// this command returns once its own claim is settled.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    let coordinator = coordinator_for(settings, &channel)?;

    let scheduled = coordinator.request()?;
    match scheduled {
        Scheduled::Started => println!("Indexing {}", channel.root().display()),
        Scheduled::Queued => println!("Index generation in progress, queued a follow-up"),
        Scheduled::Coalesced => {
            println!("A follow-up index generation is already queued");
            return Ok(());
        }
        Scheduled::Stopped => bail!("coordinator is shut down"),
    }

    coordinator.wait_idle();

    let stats = coordinator.stats();
    if stats.failed > 0 {
        bail!("index generation failed, see log for details");
    }
    if stats.succeeded > 0 {
        println!("Index generation finished");
    }
    Ok(())
}
