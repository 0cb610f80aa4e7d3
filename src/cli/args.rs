//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Conda channel server
#[derive(Parser)]
#[command(
    name = "conda-server",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serve and maintain a conda channel directory",
    long_about = "Store conda packages with atomic writes and keep the channel index \
                  up to date while packages come and go.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom conda-server.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Channel directory (overrides config)
    #[arg(long, global = true, env = "CONDA_CHANNEL_DIR")]
    pub channel_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configuration
    #[command(about = "Write a default conda-server.toml")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Watch the channel and keep its index current
    #[command(
        about = "Watch the channel directory and regenerate the index on change",
        after_help = "Examples:\n  conda-server serve\n  conda-server --channel-dir /srv/conda serve --no-initial-index\n\nStops on Ctrl-C after the running index generation finishes."
    )]
    Serve {
        /// Skip the index run at startup
        #[arg(long)]
        no_initial_index: bool,

        /// Do not watch for changes (overrides config)
        #[arg(long)]
        no_watch: bool,
    },

    /// Regenerate the index once
    #[command(about = "Regenerate channel metadata and wait for it to finish")]
    Index,

    /// Store a package in the channel
    #[command(
        about = "Upload a package file",
        after_help = "Examples:\n  conda-server upload noarch ./dist/mypkg-1.0-0.conda\n  conda-server upload linux-64 build.tar.bz2 --name mypkg-1.0-h0_0.tar.bz2"
    )]
    Upload {
        /// Target platform, e.g. linux-64 or noarch
        platform: String,

        /// Package file to upload
        file: PathBuf,

        /// File name in the channel (defaults to the source file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a package from the channel
    #[command(about = "Delete a package file")]
    Delete {
        platform: String,
        file_name: String,
    },

    /// Print a package's SHA-256 or MD5
    #[command(about = "Compute the SHA-256 (or MD5) of a package")]
    Hash {
        platform: String,
        file_name: String,

        /// Print the MD5 digest instead of SHA-256
        #[arg(long)]
        md5: bool,
    },

    /// List packages
    #[command(about = "List package files of a platform")]
    List { platform: String },

    /// Show index and lock state
    #[command(about = "Show whether index generation is running or queued")]
    Status,

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "conda-server",
            "--channel-dir",
            "/srv/conda",
            "upload",
            "noarch",
            "a.conda",
            "--name",
            "a-1.0-0.conda",
        ])
        .unwrap();

        assert_eq!(cli.channel_dir, Some(PathBuf::from("/srv/conda")));
        match cli.command {
            Commands::Upload {
                platform,
                file,
                name,
            } => {
                assert_eq!(platform, "noarch");
                assert_eq!(file, PathBuf::from("a.conda"));
                assert_eq!(name.as_deref(), Some("a-1.0-0.conda"));
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_parse_hash_md5() {
        let cli =
            Cli::try_parse_from(["conda-server", "hash", "noarch", "a-1.0-0.conda", "--md5"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Hash { md5: true, .. }));

        let cli = Cli::try_parse_from(["conda-server", "hash", "noarch", "a-1.0-0.conda"]).unwrap();
        assert!(matches!(cli.command, Commands::Hash { md5: false, .. }));
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["conda-server", "serve", "--no-initial-index"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                no_initial_index: true,
                no_watch: false
            }
        ));
    }
}
