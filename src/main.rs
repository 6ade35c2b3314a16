// Entrypoint for the `globus` CLI.
// - Parses arguments, sets up logging once, loads settings.
// - Dispatches to `commands`; a failed command prints one `ERROR:` line and
//   exits with that failure's documented code.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use globus_transfer::commands::{self, Session, TransferRequest};
use globus_transfer::config::{self, Env, RealEnv};
use globus_transfer::constants;
use globus_transfer::error::Result;
use globus_transfer::jobs::CondorCli;
use globus_transfer::settings::Settings;
use globus_transfer::wait::WaitOptions;
use globus_transfer::{logging, submit, transfer_spec, ui};

#[derive(Parser)]
#[command(
    name = "globus",
    version,
    about = "Initiate and monitor Globus transfers from the command line",
    arg_required_else_help = true
)]
struct Cli {
    /// Show log messages as the CLI runs (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Settings file (default: ~/.globus_transfer_settings).
    #[arg(long, global = true, value_name = "PATH", env = constants::SETTINGS_ENV)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct WaitArgs {
    /// Seconds to wait per attempt.
    #[arg(
        long,
        default_value_t = constants::DEFAULT_WAIT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,
    /// Seconds between status checks within an attempt.
    #[arg(
        long,
        default_value_t = constants::DEFAULT_WAIT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,
    /// How many attempts before giving up.
    #[arg(long, default_value_t = constants::DEFAULT_WAIT_ATTEMPTS)]
    attempts: u32,
}

impl WaitArgs {
    fn options(&self) -> WaitOptions {
        WaitOptions::from_secs(self.timeout, self.interval, self.attempts)
    }

    fn to_args(self) -> Vec<String> {
        vec![
            "--timeout".into(),
            self.timeout.to_string(),
            "--interval".into(),
            self.interval.to_string(),
            "--attempts".into(),
            self.attempts.to_string(),
        ]
    }
}

#[derive(Args)]
struct TransferArgs {
    /// Source endpoint id or bookmark.
    source: String,
    /// Destination endpoint id or bookmark.
    destination: String,
    /// `source_path:destination_path` pairs; directories end with `/` on both sides.
    #[arg(required = true)]
    specs: Vec<String>,
    /// The label for the transfer.
    #[arg(long)]
    label: Option<String>,
    /// Wait for the transfer to finish.
    #[arg(long)]
    wait: bool,
    #[command(flatten)]
    wait_args: WaitArgs,
    /// Print an HTCondor submit description that runs this transfer as a job.
    #[arg(long = "as-submit-description")]
    as_submit_description: bool,
}

impl TransferArgs {
    /// Arguments that make the job run this same transfer, waiting for it.
    fn job_arguments(&self, settings: Option<&PathBuf>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = settings {
            args.push("--settings".to_string());
            args.push(path.display().to_string());
        }
        args.push("transfer".to_string());
        args.push(self.source.clone());
        args.push(self.destination.clone());
        args.extend(self.specs.iter().cloned());
        if let Some(label) = &self.label {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        args.push("--wait".to_string());
        args.extend(self.wait_args.to_args());
        args
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Globus and store the credentials.
    Login,
    /// Manage endpoint bookmarks.
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Search your endpoints.
    Endpoints {
        /// Full-text filter.
        search: Option<String>,
        /// How many results to get.
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Show an endpoint's activation state.
    Info { endpoint: String },
    /// Activate endpoints, prompting for manual activation when needed.
    Activate {
        #[arg(required = true)]
        endpoints: Vec<String>,
    },
    /// List a directory on an endpoint.
    Ls {
        endpoint: String,
        #[arg(long, default_value = "~/")]
        path: String,
    },
    /// Submit a transfer between two endpoints.
    Transfer(TransferArgs),
    /// Wait for a task to finish.
    Wait {
        task_id: String,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
    /// Cancel a task.
    Cancel { task_id: String },
    /// Show recent transfer and delete tasks.
    History {
        /// How many results to get.
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Show your transfer jobs in the HTCondor queue.
    Jobs,
    /// Activate the endpoints held jobs are waiting on, then release them.
    Release,
}

#[derive(Subcommand)]
enum BookmarkAction {
    /// Add (or replace) a bookmark.
    Add { name: String, endpoint: String },
    /// Remove a bookmark.
    Rm { name: String },
    /// List bookmarks.
    Ls,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;
    tracing::debug!(
        "globus called with arguments \"{}\"",
        std::env::args().skip(1).collect::<Vec<_>>().join(" ")
    );

    let env = RealEnv;
    if let Err(e) = run(cli, &env) {
        eprintln!("ERROR: {e}");
        io::stdout().flush().ok();
        std::process::exit(e.exit_code());
    }
    Ok(())
}

/// Connect to the transfer service and run `f` with a session over the
/// production collaborators.
fn with_session<T>(
    env: &dyn Env,
    settings: &Settings,
    f: impl FnOnce(&Session) -> Result<T>,
) -> Result<T> {
    let client = commands::connect(env, settings)?;
    let prompter = ui::TerminalPrompter;
    let session = Session {
        api: &client,
        scheduler: &CondorCli,
        env,
        prompt: &prompter,
        interactive: ui::is_interactive(),
        styled: ui::stdout_styled(),
    };
    f(&session)
}

fn run(cli: Cli, env: &RealEnv) -> Result<()> {
    let settings_path = config::settings_path(env, cli.settings.as_deref())?;
    let mut settings = Settings::load(&settings_path)?;
    let styled = ui::stdout_styled();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Login => commands::login(env, &mut settings, &mut out),
        Commands::Bookmarks { action } => match action {
            BookmarkAction::Add { name, endpoint } => {
                commands::bookmark_add(&mut settings, &name, &endpoint, &mut out)
            }
            BookmarkAction::Rm { name } => commands::bookmark_rm(&mut settings, &name, &mut out),
            BookmarkAction::Ls => commands::bookmark_ls(&settings, styled, &mut out),
        },
        Commands::Endpoints { search, limit } => with_session(env, &settings, |s| {
            commands::endpoints(s, search.as_deref(), limit, &mut out)
        }),
        Commands::Info { endpoint } => with_session(env, &settings, |s| {
            commands::info(s, &settings, &endpoint, &mut out)
        }),
        Commands::Activate { endpoints } => with_session(env, &settings, |s| {
            commands::activate(s, &settings, &endpoints, &mut out)
        }),
        Commands::Ls { endpoint, path } => with_session(env, &settings, |s| {
            commands::ls(s, &settings, &endpoint, &path, &mut out)
        }),
        Commands::Transfer(args) => {
            // reject malformed specs before touching any endpoint
            let items = transfer_spec::parse_all(&args.specs)?;
            if args.as_submit_description {
                let executable = std::env::current_exe()?;
                let job_args = args.job_arguments(cli.settings.as_ref());
                let description =
                    submit::submit_description(&executable, &job_args, args.label.as_deref());
                write!(out, "{description}")?;
                return Ok(());
            }
            let request = TransferRequest {
                source: args.source,
                destination: args.destination,
                items,
                label: args.label,
                wait: args.wait.then(|| args.wait_args.options()),
            };
            with_session(env, &settings, |s| {
                commands::transfer(s, &settings, request, &mut out)
            })
        }
        Commands::Wait { task_id, wait_args } => with_session(env, &settings, |s| {
            commands::wait(s, &task_id, wait_args.options(), &mut out)
        }),
        Commands::Cancel { task_id } => {
            with_session(env, &settings, |s| commands::cancel(s, &task_id, &mut out))
        }
        Commands::History { limit } => {
            with_session(env, &settings, |s| commands::history(s, limit, &mut out))
        }
        Commands::Jobs => commands::jobs(&CondorCli, env, styled, &mut out),
        Commands::Release => with_session(env, &settings, |s| commands::release(s, &mut out)),
    }
}
