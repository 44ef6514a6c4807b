//! The `mcpcheck` command-line tool.

use clap::{ArgAction, Args, Parser, Subcommand};
use mcpcheck::config::{self, DEFAULT_SUITE_FILE};
use mcpcheck::report::{self, EXIT_FATAL, EXIT_SUCCESS};
use mcpcheck::runner::snapshot::DEFAULT_SNAPSHOT_DIR;
use mcpcheck::{CheckError, RunOptions, SnapshotStore, TestRunner};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Declarative test runner for MCP servers
///
/// Connects to a server, discovers its tools, resources and prompts, invokes
/// the declared ones and judges each result by expression, predicate or
/// stored snapshot.
#[derive(Parser)]
#[command(name = "mcpcheck", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); otherwise `RUST_LOG` or warn
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a test suite against its server
    Run(RunArgs),
    /// Inspect or delete stored snapshots
    Snapshots(SnapshotArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Suite file (JSON)
    #[arg(default_value = DEFAULT_SUITE_FILE)]
    suite: PathBuf,

    /// Only run tests whose name matches this glob
    #[arg(long)]
    filter: Option<String>,

    /// Skip tests whose name matches this glob (wins over --filter)
    #[arg(long)]
    skip: Option<String>,

    /// Connection timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Accept missing or changed snapshots as the new baseline
    #[arg(short = 'u', long)]
    update_snapshots: bool,

    /// Snapshot directory (default: `__snapshots__` next to the suite file)
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Print the results as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    #[command(subcommand)]
    action: SnapshotAction,

    /// Snapshot directory
    #[arg(long, value_name = "DIR", global = true, conflicts_with = "suite")]
    snapshot_dir: Option<PathBuf>,

    /// Use the snapshot directory of this suite file
    #[arg(long, global = true)]
    suite: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List stored snapshot names
    List,
    /// Delete a stored snapshot
    Remove {
        /// Snapshot name
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Snapshots(args) => snapshots(args).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(args: RunArgs) -> Result<u8, CheckError> {
    let mut declaration = config::load_suite(&args.suite)?;
    if let Some(filter) = args.filter {
        declaration = declaration.filter(filter);
    }
    if let Some(skip) = args.skip {
        declaration = declaration.skip(skip);
    }
    if let Some(ms) = args.timeout {
        declaration = declaration.timeout(Duration::from_millis(ms));
    }

    let mut options = RunOptions::new().update_snapshots(args.update_snapshots);
    if let Some(dir) = args.snapshot_dir {
        options = options.snapshot_dir(dir);
    }

    let mut client = config::client_for(&declaration)?;
    info!(server = %client.command_line(), "Running suite");

    match TestRunner::new(options).run(&mut client, &declaration).await {
        Ok(suite) => {
            print_suite(&suite, args.json)?;
            Ok(report::exit_code(&suite))
        }
        Err(fatal) => {
            print_suite(&fatal.suite, args.json)?;
            Err(fatal.error)
        }
    }
}

fn print_suite(suite: &mcpcheck::TestSuite, json: bool) -> Result<(), CheckError> {
    if json {
        println!("{}", report::render_json(suite)?);
    } else {
        print!("{}", report::render_console(suite));
    }
    Ok(())
}

async fn snapshots(args: SnapshotArgs) -> Result<u8, CheckError> {
    let dir = match (args.snapshot_dir, args.suite) {
        (Some(dir), _) => dir,
        (None, Some(suite)) => config::snapshot_dir_of(suite)?,
        (None, None) => PathBuf::from(DEFAULT_SNAPSHOT_DIR),
    };
    let store = SnapshotStore::new(dir);

    match args.action {
        SnapshotAction::List => {
            for name in store.list().await? {
                println!("{name}");
            }
        }
        SnapshotAction::Remove { name } => {
            if store.remove(&name).await? {
                println!("Removed {}", store.path_for(&name).display());
            } else {
                println!("No snapshot named '{name}' in {}", store.dir().display());
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
