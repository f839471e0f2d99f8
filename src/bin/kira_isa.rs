use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_isatab::app::{App, ProcessOptions, Report};
use kira_isatab::config::{ConfigLoader, ResolvedConfig, parse_quote};
use kira_isatab::error::IsaError;
use kira_isatab::output::{JsonOutput, LogProgress, OutputMode, TextOutput};

#[derive(Parser)]
#[command(name = "kira-isa")]
#[command(about = "Read, validate and normalize ISA-Tab investigations")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (default: kira-isa.json if present)")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate an investigation and all its sheets")]
    Validate(ValidateArgs),
    #[command(about = "Rewrite study and assay sheets into an output directory")]
    Normalize(NormalizeArgs),
    #[command(about = "Render the material/process graphs as Graphviz dot")]
    Dot(DotArgs),
}

#[derive(Args)]
struct InvestigationArg {
    #[arg(short = 'i', long = "investigation-file", help = "Path to the investigation file")]
    investigation: Utf8PathBuf,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    input: InvestigationArg,

    #[arg(long, help = "Fail on moderate or critical warnings")]
    strict: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct NormalizeArgs {
    #[command(flatten)]
    input: InvestigationArg,

    #[arg(short = 'o', long)]
    output_dir: Utf8PathBuf,

    #[arg(long, help = "Quote character for read and written cells, empty for none")]
    quote: Option<String>,

    #[arg(long)]
    strict: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DotArgs {
    #[command(flatten)]
    input: InvestigationArg,

    #[arg(short = 'o', long, help = "Output file, stdout when omitted")]
    output_file: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<IsaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IsaError) -> u8 {
    match error {
        IsaError::UnresolvablePath(_)
        | IsaError::ConfigRead(_)
        | IsaError::ConfigParse(_)
        | IsaError::InvalidConfig(_) => 2,
        IsaError::EmptySheet
        | IsaError::MalformedHeader { .. }
        | IsaError::RowLength { .. }
        | IsaError::UnknownLabel(_)
        | IsaError::UnterminatedQuote { .. }
        | IsaError::InvalidInvestigation { .. }
        | IsaError::DanglingArc { .. }
        | IsaError::UnwritableCell(_) => 3,
        IsaError::StrictViolation { .. } => 4,
        IsaError::Io(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate(args) => run_validate(args, &config),
        Commands::Normalize(args) => run_normalize(args, &config),
        Commands::Dot(args) => run_dot(args, &config),
    }
}

fn run_validate(args: ValidateArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let app = App::new(ProcessOptions::from_config(config));
    let report = app.process(&args.input.investigation, &LogProgress)?;
    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    finish(&report, mode, args.strict || config.strict)
}

fn run_normalize(args: NormalizeArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let mut options = ProcessOptions::from_config(config);
    if let Some(quote) = args.quote.as_deref() {
        options.quote = parse_quote(quote)?;
    }
    options.output_dir = Some(args.output_dir);
    let app = App::new(options);
    let report = app.process(&args.input.investigation, &LogProgress)?;
    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    finish(&report, mode, args.strict || config.strict)
}

fn run_dot(args: DotArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let app = App::new(ProcessOptions::from_config(config));
    match args.output_file {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            app.export_dot(&args.input.investigation, BufWriter::new(file), &LogProgress)?;
        }
        None => {
            let stdout = io::stdout().lock();
            let mut out = app.export_dot(&args.input.investigation, stdout, &LogProgress)?;
            out.flush().into_diagnostic()?;
        }
    }
    Ok(())
}

fn finish(report: &Report, mode: OutputMode, strict: bool) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_report(report).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_report(report).into_diagnostic()?,
    }
    if strict {
        report.enforce_strict()?;
    }
    Ok(())
}
