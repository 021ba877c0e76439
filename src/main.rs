use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use rideping::config::Config;
use rideping::replay::{self, ReplayEvent, Script};
use rideping::thread::UserId;
use rideping::{plog, Error, Result};

/// Rideping - real-time cross-thread message notifications
#[derive(Parser, Debug)]
#[command(name = "rideping")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    RIDEPING_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.rideping/rideping.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the effective configuration as TOML
    Config,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Replay a JSON script against an in-memory store and print the
    /// notification lifecycle
    Replay {
        /// Path to the script
        script: PathBuf,

        /// Current user (overrides the script's "user")
        #[arg(long, short = 'u')]
        user: Option<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    rideping::log::init_with_debug(cli.debug);
    plog!("rideping starting command={:?}", cli.command);

    match cli.command {
        Command::Config => run_config(),
        Command::Init { force } => run_init(force),
        Command::Replay { script, user, json } => run_replay(script, user, json),
    }
}

fn run_config() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn run_init(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        println!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    Config::default().save()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_replay(path: PathBuf, user: Option<String>, json: bool) -> Result<()> {
    let script = Script::load(&path)?;
    let user = user
        .map(UserId::from)
        .or_else(|| script.user.clone())
        .ok_or_else(|| Error::Validation("no user given (use --user)".to_string()))?;
    let config = Config::load()?;
    plog!("Replaying {} as {}", path.display(), user);

    let events = Runtime::new()?.block_on(replay::run(script, user, config, move |event| {
        print_event(event, json)
    }))?;

    if !json {
        let shown = events
            .iter()
            .filter(|e| matches!(e, ReplayEvent::Shown { .. }))
            .count();
        println!("{} notification(s) shown", shown);
    }
    Ok(())
}

fn print_event(event: &ReplayEvent, json: bool) {
    if !json {
        println!("{}", event);
        return;
    }
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Failed to encode event: {}", e),
    }
}
