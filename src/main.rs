// Command-line entry point for solpattern.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use solpattern::application::AnalyzeUsecase;
use solpattern::config::{Config, IncompatiblePolicy, OutputFormat};
use solpattern::infrastructure::concurrency::init_thread_pool;
use solpattern::infrastructure::logging::init_tracing;
use solpattern::infrastructure::{
    load_descriptors, PragmaVersionGate, SolidityParser, SourceLoader,
};
use solpattern::ports::report_exporter::{
    write_descriptors, CsvExporter, JsonExporter, TerminalSummary,
};
use solpattern::ports::ReportExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./solpattern.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging and per-check evidence in the summary (SOLPATTERN_LOG overrides the filter)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run pattern descriptors against a contract file or directory
    Analyze(AnalyzeArgs),
    /// Report what every check observes in each contract, without descriptors
    Describe(DescribeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Solidity file or directory (batch mode)
    #[arg(short, long)]
    target: PathBuf,

    /// Descriptor file or directory of descriptors
    #[arg(short, long, default_value = "descriptors")]
    descriptors: PathBuf,

    /// Report format (overrides the config file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a coloured summary; without --output it replaces the report on stdout
    #[arg(short, long)]
    print: bool,

    /// Analyze files whose pragma is outside the supported range, with a warning
    #[arg(long)]
    allow_incompatible: bool,

    /// Worker threads, 0 = all cores (overrides the config file)
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Args, Debug)]
struct DescribeArgs {
    /// Solidity file or directory
    #[arg(short, long)]
    target: PathBuf,

    /// Write one `<Contract>_descriptor.json` per contract here instead of
    /// printing fact sheets
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::resolve(cli.config.as_deref())?;
    match cli.command {
        Command::Analyze(args) => analyze(config, args, cli.verbose),
        Command::Describe(args) => describe(config, args),
    }
}

fn analyze(mut config: Config, args: AnalyzeArgs, verbose: bool) -> Result<()> {
    if args.allow_incompatible {
        config.versions.on_incompatible = IncompatiblePolicy::Warn;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(jobs) = args.jobs {
        config.analysis.jobs = jobs;
    }
    init_thread_pool(config.analysis.jobs).context("Failed to initialize thread pool")?;

    let descriptors = load_descriptors(&args.descriptors)?;
    let files = SourceLoader::new(&config.analysis.extensions).collect(&args.target)?;
    if files.is_empty() {
        warn!(target = %args.target.display(), "no Solidity sources found");
    }
    info!(files = files.len(), descriptors = descriptors.len(), "starting analysis");

    let gate = version_gate(&config)?;
    let usecase = AnalyzeUsecase {
        parser: &SolidityParser,
        version_gate: &gate,
        policy: config.versions.on_incompatible,
    };
    let report = usecase.analyze_batch(&files, &descriptors);

    for failed in report.failed() {
        if let Some(error) = &failed.error {
            eprintln!("{}: {error}", failed.path.display());
        }
    }

    let exporter: &dyn ReportExporter = match config.output.format {
        OutputFormat::Json => &JsonExporter,
        OutputFormat::Csv => &CsvExporter,
    };
    if let Some(output) = &args.output {
        let path = output.to_string_lossy();
        exporter
            .export(&report, &path)
            .with_context(|| format!("Failed to write report to {path}"))?;
        info!(path = %path, "report written");
    }
    if args.print {
        print!("{}", TerminalSummary { evidence: verbose }.render(&report)?);
    } else if args.output.is_none() {
        print!("{}", exporter.render(&report)?);
    }
    Ok(())
}

fn version_gate(config: &Config) -> Result<PragmaVersionGate> {
    PragmaVersionGate::new(&config.versions.supported).context("Invalid [versions] supported range")
}

fn describe(config: Config, args: DescribeArgs) -> Result<()> {
    let gate = version_gate(&config)?;
    let usecase = AnalyzeUsecase {
        parser: &SolidityParser,
        version_gate: &gate,
        policy: config.versions.on_incompatible,
    };

    let mut sheets = Vec::new();
    for file in SourceLoader::new(&config.analysis.extensions).collect(&args.target)? {
        match usecase.describe_file(&file) {
            Ok(found) => sheets.extend(found),
            Err(err) => eprintln!("{}: {err}", file.display()),
        }
    }

    match &args.output_dir {
        Some(dir) => {
            let written = write_descriptors(&sheets, dir)
                .with_context(|| format!("Failed to write descriptors to {}", dir.display()))?;
            for path in written {
                println!("{}", path.display());
            }
        }
        None => {
            let json =
                serde_json::to_string_pretty(&sheets).context("Failed to serialize fact sheets")?;
            println!("{json}");
        }
    }
    Ok(())
}
