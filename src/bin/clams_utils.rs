use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use clams_utils::config::{ConfigLoader, ConfigOverrides, RetrieverConfig};
use clams_utils::domain::{Bundle, DatasetId};
use clams_utils::error::{ErrorKind, GoldError};
use clams_utils::output::{JsonOutput, OutputMode, TextOutput};
use clams_utils::remote::{GithubTreeSource, GoldSource};
use clams_utils::retriever::GoldRetriever;
use clams_utils::store::Store;

#[derive(Parser)]
#[command(name = "clams-utils")]
#[command(about = "A unified CLI for CLAMS utilities")]
#[command(version)]
struct Cli {
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download and manage gold annotation releases")]
    Gold(GoldArgs),
}

#[derive(Args)]
struct GoldArgs {
    #[command(subcommand)]
    command: GoldCommand,
}

#[derive(Subcommand)]
enum GoldCommand {
    #[command(about = "Download a gold dataset unless it is already cached")]
    #[command(alias = "goldretriever")]
    Fetch(FetchArgs),
    #[command(about = "List cached gold datasets")]
    List(CacheArgs),
    #[command(about = "Show files of a cached gold dataset")]
    Info(InfoArgs),
    #[command(about = "Remove a cached gold dataset, or the whole cache")]
    Clear(ClearArgs),
}

#[derive(Args, Clone)]
struct CacheArgs {
    /// Directory under which datasets are stored
    #[arg(short = 'o', long = "output-root")]
    output_root: Option<Utf8PathBuf>,

    /// Path to a JSON config file (default: ./clams-utils.json if present)
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct FetchArgs {
    /// Dataset path inside the annotation repository, e.g. `batch-01`
    dataset_id: String,

    /// Download even when a cached copy exists
    #[arg(long)]
    force: bool,

    /// GitHub tree URL of the annotation repository
    #[arg(long)]
    remote_base: Option<String>,

    #[command(flatten)]
    cache: CacheArgs,
}

#[derive(Args)]
struct InfoArgs {
    dataset_id: String,

    #[command(flatten)]
    cache: CacheArgs,
}

#[derive(Args)]
struct ClearArgs {
    /// Dataset to remove; omit to remove the whole cache
    dataset_id: Option<String>,

    #[command(flatten)]
    cache: CacheArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GoldError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GoldError) -> u8 {
    match error.kind() {
        ErrorKind::NotFound => 2,
        ErrorKind::Network => 3,
        ErrorKind::InvalidInput | ErrorKind::Filesystem => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Gold(args) => run_gold(args.command, output_mode),
    }
}

fn run_gold(command: GoldCommand, output_mode: OutputMode) -> miette::Result<()> {
    match command {
        GoldCommand::Fetch(args) => {
            let config = resolve_config(
                &args.cache,
                ConfigOverrides {
                    cache_root: args.cache.output_root.clone(),
                    remote_base: args.remote_base,
                    force: args.force,
                },
            )?;
            let id: DatasetId = args.dataset_id.parse()?;
            let source = GithubTreeSource::new(&config)?;
            let retriever = GoldRetriever::new(Store::new(config.cache_root.clone()), source);
            let result = retriever.retrieve(&id, config.force)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_fetch(&result).into_diagnostic()?,
                OutputMode::Human => TextOutput::print_fetch(&result),
            }
            Ok(())
        }
        GoldCommand::List(args) => {
            let retriever = offline_retriever(&args)?;
            let result = retriever.list()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_list(&result).into_diagnostic()?,
                OutputMode::Human => TextOutput::print_list(&result),
            }
            Ok(())
        }
        GoldCommand::Info(args) => {
            let id: DatasetId = args.dataset_id.parse()?;
            let retriever = offline_retriever(&args.cache)?;
            let result = retriever.info(&id)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_info(&result).into_diagnostic()?,
                OutputMode::Human => TextOutput::print_info(&result),
            }
            Ok(())
        }
        GoldCommand::Clear(args) => {
            let id = args
                .dataset_id
                .as_deref()
                .map(str::parse::<DatasetId>)
                .transpose()?;
            let retriever = offline_retriever(&args.cache)?;
            let result = retriever.clear(id.as_ref())?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_clear(&result).into_diagnostic()?,
                OutputMode::Human => TextOutput::print_clear(&result),
            }
            Ok(())
        }
    }
}

fn resolve_config(
    args: &CacheArgs,
    overrides: ConfigOverrides,
) -> Result<RetrieverConfig, GoldError> {
    ConfigLoader::resolve(args.config.as_deref(), overrides)
}

fn offline_retriever(args: &CacheArgs) -> Result<GoldRetriever<Offline>, GoldError> {
    let config = resolve_config(
        args,
        ConfigOverrides {
            cache_root: args.output_root.clone(),
            ..ConfigOverrides::default()
        },
    )?;
    Ok(GoldRetriever::new(Store::new(config.cache_root), Offline))
}

/// Source for commands that only look at the local cache.
struct Offline;

impl GoldSource for Offline {
    fn fetch_bundle(&self, id: &DatasetId) -> Result<Bundle, GoldError> {
        Err(GoldError::Http(format!(
            "network access is disabled for this command ({id})"
        )))
    }
}
