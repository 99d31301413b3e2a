use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod apt;
mod completion;
mod dispatch;
mod render;
mod reports;
mod settings;

use completion::CliCompletionShell;

const LOG_FILTER_ENV: &str = "APTWRAP_LOG";

#[derive(Parser, Debug)]
#[command(name = "aptwrap")]
#[command(
    about = "apt front-end that tracks newly available packages and logs installed-state changes",
    long_about = None
)]
struct Cli {
    /// Directory holding per-host state.
    #[arg(long, global = true, env = "APTWRAP_HOME")]
    state_root: Option<PathBuf>,
    /// Host id used to name the per-host state directory.
    #[arg(long, global = true)]
    host: Option<String>,
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Pass -y to apt-get.
    #[arg(short = 'y', long = "yes", global = true)]
    assume_yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Refresh package lists and record newly available packages.
    Update,
    /// List packages that appeared in the last update.
    New {
        #[arg(long)]
        json: bool,
    },
    /// List installed packages whose candidate version changed in the last update.
    #[command(name = "newupgrades")]
    NewUpgrades {
        #[arg(long)]
        json: bool,
    },
    /// List installed packages with a different available version.
    #[command(name = "toupgrade")]
    ToUpgrade {
        #[arg(long)]
        json: bool,
    },
    Status {
        #[arg(long)]
        json: bool,
    },
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    Purge {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    Upgrade,
    DistUpgrade,
    Autoremove,
    /// Show recorded install/remove/upgrade/downgrade events.
    #[command(name = "listlog")]
    ListLog {
        #[arg(long)]
        tail: Option<usize>,
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Discard snapshot history and take a fresh baseline.
    Reset,
    Doctor,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = dispatch::run_cli(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests;
