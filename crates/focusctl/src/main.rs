//! focusctl - inspect the audiofocus policy and replay focus scenarios
//!
//! Subcommands:
//! - `focusctl decide <incumbent> <candidate>` - Verdict for one stream pair
//! - `focusctl table` - Verdict matrix across focus classes
//! - `focusctl run <scenario.toml>` - Replay a scripted scenario
//! - `focusctl config` - Print the effective configuration

use anyhow::{Context, Result};
use audiofocus::{AudioManager, ContentType, StreamUsage};
use clap::{Parser, Subcommand};
use focusconf::FocusConfig;
use std::path::PathBuf;

mod commands;
mod scenario;
mod telemetry;

#[derive(Parser)]
#[command(name = "focusctl")]
#[command(about = "Inspect the audiofocus policy and replay focus scenarios")]
#[command(version)]
struct Cli {
    /// Config file layered over the system and user configs
    #[arg(short, long, global = true, env = "AUDIOFOCUS_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (overrides the configured level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the verdict when a candidate stream starts over an incumbent
    Decide {
        /// Usage of the stream already playing (e.g. media)
        incumbent: StreamUsage,

        /// Usage of the stream asking for focus (e.g. voice_communication)
        candidate: StreamUsage,

        #[arg(long, default_value = "unknown")]
        incumbent_content: ContentType,

        #[arg(long, default_value = "unknown")]
        candidate_content: ContentType,
    },

    /// Print the verdict for every pair of focus classes
    Table,

    /// Replay a scenario file and check its expectations
    Run {
        /// Scenario TOML file
        scenario: PathBuf,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = FocusConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    telemetry::init(&config.telemetry, cli.log_level.as_deref(), !cli.no_color)?;
    tracing::debug!(files = ?sources.files, "configuration loaded");

    let manager = AudioManager::from_config(&config).context("Invalid arbitration config")?;
    let style = commands::Style::new(cli.no_color);

    match cli.command {
        Commands::Decide {
            incumbent,
            candidate,
            incumbent_content,
            candidate_content,
        } => {
            commands::decide(
                &manager,
                (incumbent_content, incumbent),
                (candidate_content, candidate),
                &style,
            );
        }
        Commands::Table => {
            commands::table(&manager, &style);
        }
        Commands::Run { scenario } => {
            let scenario = scenario::load(&scenario)?;
            let report = scenario::run(&manager, &scenario)?;
            commands::print_report(&report, &style);
            if report.failures() > 0 {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            commands::show_config(&config, &sources, &style);
        }
    }

    Ok(())
}
