//! attendance-syncd - offline-first attendance write queue.
//!
//! `run` starts the interactive daemon that owns connectivity state and
//! performs remote writes. `background-sync` is what the platform wakes when
//! connectivity returns. The remaining commands are operator tools.

mod app;
mod wake;

use std::path::PathBuf;

use anyhow::Context;
use attendance_config::{init_logging, Config, Paths};
use attendance_protocol::ConnectivityState;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

/// Attendance sync command-line interface.
#[derive(Parser)]
#[command(name = "attendance-syncd")]
#[command(about = "Offline-first attendance write queue and sync daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (queue, socket, logs, config). Defaults to ~/.attendance-sync
    #[arg(long, global = true, env = "ATTENDANCE_BASE_DIR")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive sync daemon in the foreground
    Run {
        /// Connectivity to assume until the first reachability report
        #[arg(long, value_enum, default_value_t = Reachability::Online)]
        assume: Reachability,
    },
    /// Record one attendance mark
    Mark {
        #[arg(long)]
        session: String,
        #[arg(long)]
        member: String,
        /// Member display name
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: Option<String>,
        /// Queue without trying the remote store
        #[arg(long)]
        offline: bool,
    },
    /// Show queue sizes and daemon reachability
    Status,
    /// Print queued events as JSON lines
    List {
        /// List dead-lettered events instead of pending ones
        #[arg(long)]
        rejected: bool,
    },
    /// Drain the queue now
    Sync {
        /// Drain in this process instead of asking the daemon
        #[arg(long)]
        local: bool,
    },
    /// Report a reachability change to the daemon
    Notify {
        #[arg(value_enum)]
        state: Reachability,
    },
    /// Run one background delegate pass
    BackgroundSync {
        /// Run even if no wake registration is pending
        #[arg(long)]
        force: bool,
    },
    /// Delete queued events
    #[command(group(ArgGroup::new("which").required(true).args(["synced", "all", "rejected"])))]
    Purge {
        /// Events already marked synced
        #[arg(long)]
        synced: bool,
        /// Every pending event
        #[arg(long)]
        all: bool,
        /// Every dead-lettered event
        #[arg(long)]
        rejected: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Reachability {
    Online,
    Offline,
}

impl From<Reachability> for ConnectivityState {
    fn from(value: Reachability) -> Self {
        match value {
            Reachability::Online => ConnectivityState::Online,
            Reachability::Offline => ConnectivityState::Offline,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths).context("failed to load configuration")?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let (service, also_stderr) = match &cli.command {
        None | Some(Commands::Run { .. }) => ("attendance-syncd", true),
        Some(Commands::BackgroundSync { .. }) => ("attendance-delegate", false),
        Some(_) => ("attendance-cli", false),
    };
    init_logging(service, level, &paths, also_stderr)?;

    match cli.command {
        None => app::run_daemon(config, paths, ConnectivityState::Online).await,
        Some(Commands::Run { assume }) => app::run_daemon(config, paths, assume.into()).await,
        Some(Commands::Mark {
            session,
            member,
            name,
            department,
            offline,
        }) => {
            let state = if offline {
                ConnectivityState::Offline
            } else {
                ConnectivityState::Online
            };
            app::mark(&config, &paths, state, session, member, name, department).await
        }
        Some(Commands::Status) => app::status(&paths).await,
        Some(Commands::List { rejected }) => app::list(&paths, rejected).await,
        Some(Commands::Sync { local }) => app::sync(&config, &paths, local).await,
        Some(Commands::Notify { state }) => app::notify(&paths, state.into()).await,
        Some(Commands::BackgroundSync { force }) => {
            app::background_sync(&config, &paths, force).await
        }
        Some(Commands::Purge {
            synced,
            all,
            rejected,
        }) => app::purge(&paths, synced, all, rejected).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn purge_requires_a_target() {
        assert!(Cli::try_parse_from(["attendance-syncd", "purge"]).is_err());
        let cli = Cli::try_parse_from(["attendance-syncd", "purge", "--rejected"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Purge { rejected: true, synced: false, all: false })
        ));
    }

    #[test]
    fn notify_parses_state() {
        let cli = Cli::try_parse_from(["attendance-syncd", "notify", "offline"]).unwrap();
        let Some(Commands::Notify { state }) = cli.command else {
            panic!("expected notify");
        };
        assert_eq!(ConnectivityState::from(state), ConnectivityState::Offline);
    }
}
