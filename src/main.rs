use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;

use conda_server::cli::commands::{self, serve::ServeArgs};
use conda_server::cli::{Cli, Commands};
use conda_server::config::{DEFAULT_CONFIG_FILE, Settings};
use conda_server::logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut settings = match (&cli.command, Settings::load(Some(config_path.as_path()))) {
        // A broken file is what `init --force` is for.
        (Commands::Init { .. }, Err(_)) => Settings::default(),
        (_, loaded) => loaded.map_err(|e| anyhow!("{e}"))?,
    };
    if let Some(channel_dir) = cli.channel_dir {
        settings.channel_dir = channel_dir;
    }

    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => commands::init::run_init(&config_path, force),
        Commands::Serve {
            no_initial_index,
            no_watch,
        } => {
            let args = ServeArgs {
                no_initial_index,
                no_watch,
            };
            commands::serve::run(args, &settings).await
        }
        Commands::Index => {
            let settings = settings.clone();
            tokio::task::spawn_blocking(move || commands::index::run(&settings)).await?
        }
        Commands::Upload {
            platform,
            file,
            name,
        } => commands::packages::run_upload(&settings, &platform, &file, name.as_deref()),
        Commands::Delete {
            platform,
            file_name,
        } => commands::packages::run_delete(&settings, &platform, &file_name),
        Commands::Hash {
            platform,
            file_name,
            md5,
        } => commands::packages::run_hash(&settings, &platform, &file_name, md5),
        Commands::List { platform } => commands::packages::run_list(&settings, &platform),
        Commands::Status => commands::status::run(&settings),
        Commands::Config => commands::init::run_config(&settings),
    }
}
