use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bulk_clone::{
    Config, GhCliProcessor, GitHubCatalog, HiddenDisplay, Orchestrator, ProgressDisplay,
    RunOutcome, TerminalDisplay,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bulk-clone")]
#[command(version, about = "Clone or sync every repository of a GitHub owner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Clone missing repositories and sync existing ones into DIRECTORY/<owner>/<name>")]
    Repos(ReposArgs),
}

#[derive(Args)]
struct ReposArgs {
    /// Root directory for the checkouts
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// User or organization whose repositories are processed
    #[arg(short, long)]
    owner: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Give up after this many seconds
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Remote name for the parent repository when cloning a fork
    #[arg(short = 'u', long)]
    upstream_remote_name: Option<String>,

    /// Include archived repositories
    #[arg(long)]
    include_archived: bool,

    /// JSON configuration file; command-line flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra flags passed to `git clone`
    #[arg(last = true, value_name = "GIT_ARGS")]
    git_args: Vec<String>,
}

impl ReposArgs {
    async fn into_config(self) -> bulk_clone::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path).await?,
            None => Config::default(),
        };

        config.clone.directory = self.directory;
        if let Some(owner) = self.owner {
            config.owner = owner;
        }
        if let Some(workers) = self.workers {
            config.clone.workers = workers;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(name) = self.upstream_remote_name {
            config.clone.upstream_remote_name = name;
        }
        if self.include_archived {
            config.catalog.include_archived = true;
        }
        if !self.git_args.is_empty() {
            config.clone.git_args = self.git_args;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Repos(args) => repos(args).await,
    };

    result.unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    })
}

async fn repos(args: ReposArgs) -> bulk_clone::Result<ExitCode> {
    let config = args.into_config().await?;
    config.validate()?;
    let timeout = config.timeout;

    let processor = GhCliProcessor::from_config(&config.clone)?;
    let catalog =
        GitHubCatalog::from_config(&config.catalog, Some(processor.binary_path())).await?;

    let display: Box<dyn ProgressDisplay> = if std::io::stderr().is_terminal() {
        Box::new(TerminalDisplay::stderr())
    } else {
        Box::new(HiddenDisplay)
    };

    let report = Orchestrator::new(config, Arc::new(catalog), Arc::new(processor))
        .run(display)
        .await?;

    if let Some(failure) = &report.render_failure {
        eprintln!("warning: {}", failure);
    }

    match &report.outcome {
        RunOutcome::Completed | RunOutcome::Aborted => {}
        RunOutcome::DeadlineExceeded => {
            let total = report
                .total
                .map_or_else(|| "?".to_string(), |t| t.to_string());
            eprintln!(
                "error: timed out after {}s with {}/{} repositories done",
                timeout.as_secs(),
                report.completed,
                total
            );
        }
        RunOutcome::Failed(failures) => eprintln!("error: {}", failures),
    }

    Ok(if report.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
