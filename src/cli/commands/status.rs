//! Status command - index state and package counts.

use crate::channel::PLATFORMS;
use crate::config::Settings;
use crate::index::CoordinatorState;

use super::{coordinator_for, open_channel};

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    let coordinator = coordinator_for(settings, &channel)?;

    println!("Channel: {}", channel.root().display());
    let state = match coordinator.state() {
        CoordinatorState::Idle => "idle",
        CoordinatorState::Executing => "generating",
        CoordinatorState::ExecutingWithPending => "generating, follow-up queued",
    };
    println!("Index:   {state}");

    for platform in PLATFORMS {
        let count = channel.packages(platform)?.len();
        if count > 0 {
            println!("  {platform:<15} {count} packages");
        }
    }
    Ok(())
}
