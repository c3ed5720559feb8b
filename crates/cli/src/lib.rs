use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use command::{
    CommandAction, CommandRequest, CommandResponse, DataSource, EntityKind, ExportPayload,
    LeaderboardPayload, LiftPayload, NetworkPayload,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

mod command;
mod loader;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "lift-report")]
#[command(about = "Engagement lift leaderboards and network rollups", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Report profile: builtin name or path to a JSON/TOML file
    #[arg(long, global = true, env = "LIFT_REPORT_PROFILE", default_value = "default")]
    profile: String,

    /// Directory holding one JSON document per school
    #[arg(long, global = true, env = "LIFT_REPORT_DATA", default_value = "data")]
    data: PathBuf,

    /// Brand-partnership summary document
    #[arg(long, global = true, env = "LIFT_REPORT_BRANDS")]
    brands: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a JSON Command API request
    Command(CommandArgs),

    /// Rank schools, brands, athletes or categories by a metric
    Leaderboard(LeaderboardArgs),

    /// Network-wide rollup across every loaded school
    Network(NetworkArgs),

    /// Per-school lift table with each school's best IP type
    Lift(LiftArgs),

    /// Flat entity × metric rows for an external exporter
    Export(ExportArgs),
}

#[derive(Args)]
struct CommandArgs {
    /// Inline JSON request (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing the JSON request
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct LeaderboardArgs {
    /// What to rank
    #[arg(long, value_enum, default_value_t = EntityKind::School)]
    entity: EntityKind,

    /// contents|likes|comments|emv|engagement_rate|engagement_per_post|best_lift|lift:<ip_type>
    #[arg(long, default_value = "engagement_rate")]
    metric: String,

    /// Sort direction: asc|desc
    #[arg(long, default_value = "desc")]
    direction: String,

    /// Case-insensitive substring match on the entity name
    #[arg(long)]
    search: Option<String>,

    /// Keep one category: industry for brands, region for schools, school for athletes
    #[arg(long, visible_alias = "industry")]
    category: Option<String>,

    /// Keep entities whose lift for an IP type exceeds a percentage (e.g. logo:25)
    #[arg(long, value_name = "IP:PCT")]
    min_lift: Option<String>,

    /// Keep entities with at least this many posts
    #[arg(long)]
    min_contents: Option<u64>,

    /// Drop entities without any posts
    #[arg(long)]
    hide_empty: bool,

    /// Maximum rows to return
    #[arg(long)]
    limit: Option<usize>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct NetworkArgs {
    /// Only the network totals and lifts, without category breakdowns
    #[arg(long)]
    totals_only: bool,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct LiftArgs {
    /// Restrict the table to one school (aliases accepted)
    #[arg(long)]
    school: Option<String>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Append the network totals after the per-school rows
    #[arg(long)]
    include_network: bool,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let source = DataSource {
        data_dir: cli.data,
        brands: cli.brands,
        profile: cli.profile,
    };

    match cli.command {
        Commands::Command(args) => run_command(args, source).await,
        Commands::Leaderboard(args) => {
            let payload = LeaderboardPayload {
                entity: args.entity,
                metric: Some(args.metric),
                direction: Some(args.direction),
                search: args.search,
                category: args.category,
                min_lift: args.min_lift,
                min_contents: args.min_contents,
                hide_empty: args.hide_empty,
                limit: args.limit,
            };
            run_action(CommandAction::Leaderboard, payload, source, args.pretty).await
        }
        Commands::Network(args) => {
            let payload = NetworkPayload {
                totals_only: args.totals_only,
            };
            run_action(CommandAction::Network, payload, source, args.pretty).await
        }
        Commands::Lift(args) => {
            let payload = LiftPayload {
                school: args.school,
            };
            run_action(CommandAction::Lift, payload, source, args.pretty).await
        }
        Commands::Export(args) => {
            let payload = ExportPayload {
                include_network: args.include_network,
            };
            run_action(CommandAction::Export, payload, source, args.pretty).await
        }
    }
}

async fn run_action<P: Serialize>(
    action: CommandAction,
    payload: P,
    source: DataSource,
    pretty: bool,
) -> Result<()> {
    let request = CommandRequest {
        action,
        payload: serde_json::to_value(payload)?,
        source: None,
    };
    let response = command::execute(request, source).await;
    emit(&response, pretty)
}

async fn run_command(args: CommandArgs, source: DataSource) -> Result<()> {
    let parsed = read_request(&args).and_then(|raw| {
        serde_json::from_str::<CommandRequest>(&raw)
            .context("Invalid JSON passed to --json/--file")
    });
    let response = match parsed {
        Ok(request) => command::execute(request, source).await,
        Err(err) => command::error_response(err, None, 0),
    };
    emit(&response, args.pretty)
}

fn emit(response: &CommandResponse, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    print_stdout(&output)?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_request(args: &CommandArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;

    if buffer.trim().is_empty() {
        anyhow::bail!("Command request is empty. Provide --json, --file, or pipe JSON via stdin.");
    }

    Ok(buffer)
}
