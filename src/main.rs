use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use trackport::config::{DEFAULT_GRACE_SECS, RunConfig};
use trackport::output::Format;
use trackport::tracker::github::DEFAULT_API_URL;
use trackport::tracker::{Credentials, Target};

#[derive(Parser)]
#[command(
    name = "trackport",
    version,
    about = "Migrate bug-tracker exports into a numbered issue tracker, keeping ids where possible"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Log every destination call
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate an export into a destination tracker, slot by slot
    Migrate {
        /// Export file (YAML or JSON), or - for stdin
        #[arg(long)]
        export: String,
        #[command(flatten)]
        destination: DestinationArgs,
        /// Translation table overrides (YAML)
        #[arg(long)]
        tables: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Copy one tracker onto another with identical numbering
    Copy {
        #[command(flatten)]
        from: FromArgs,
        #[command(flatten)]
        to: ToArgs,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DestinationArgs {
    /// Destination repository (owner/name)
    #[arg(long)]
    repo: Option<String>,
    /// Destination snapshot file
    #[arg(long)]
    local: Option<PathBuf>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct FromArgs {
    /// Source repository (owner/name)
    #[arg(long)]
    from: Option<String>,
    /// Source snapshot file
    #[arg(long)]
    from_local: Option<PathBuf>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ToArgs {
    /// Destination repository (owner/name)
    #[arg(long)]
    to: Option<String>,
    /// Destination snapshot file
    #[arg(long)]
    to_local: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// API token for remote trackers
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Base URL of the REST API
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Apply changes (default is a dry run)
    #[arg(long)]
    force: bool,
    /// Seconds to wait before writing
    #[arg(long, hide = true, default_value_t = DEFAULT_GRACE_SECS)]
    grace: u64,
}

impl RunArgs {
    fn credentials(&self) -> Credentials {
        Credentials {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
        }
    }

    fn config(&self, destination: &Target) -> RunConfig {
        RunConfig::new(destination.to_string(), self.force, self.grace)
    }
}

fn init_tracing(debug: bool) {
    tracing_subscriber::fmt()
        .with_max_level(if debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .with_ansi(std::env::var_os("NO_COLOR").is_none())
        .with_target(false)
        .init();
}

fn run(cli: Cli, format: Format) -> trackport::error::Result<()> {
    match cli.command {
        Commands::Migrate {
            export,
            destination,
            tables,
            run,
        } => {
            let target = Target::from_args(destination.repo, destination.local)?;
            trackport::commands::migrate::run(
                &export,
                &target,
                &run.credentials(),
                tables.as_deref(),
                &run.config(&target),
                format,
            )
        }
        Commands::Copy { from, to, run } => {
            let source = Target::from_args(from.from, from.from_local)?;
            let dest = Target::from_args(to.to, to.to_local)?;
            trackport::commands::copy::run(
                &source,
                &dest,
                &run.credentials(),
                &run.config(&dest),
                format,
            )
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    init_tracing(cli.debug);

    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
