//! arguard
//!
//! Command-line interface for the contract analyzer.

mod config;

use arguard_contracts::{AnalysisStats, Analyzer, AnalyzerConfig, FactRegistry, FrontendError};
use arguard_diagnostics::render::{Summary, TerminalRenderer};
use arguard_diagnostics::{Diagnostic, DiagnosticKind};
use arguard_frontend::{FileSystemResolver, SourceFrontend, SyntaxError};
use arguard_parser::ParseError;
use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::ProjectConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use termcolor::ColorChoice;

/// Exit status when analysis found a problem
const EXIT_FINDINGS: u8 = 1;
/// Exit status when a unit or the configuration could not be loaded
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "arguard")]
#[command(version)]
#[command(about = "Infers argument contracts from guard clauses and checks call sites against them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// When to color output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Check call sites in the given units against the contracts they reach
    Check(UnitArgs),
    /// List the contracts extracted from the given units
    Contracts(UnitArgs),
}

#[derive(Args)]
struct UnitArgs {
    /// Units to analyze, by import path
    #[arg(required = true)]
    units: Vec<String>,

    /// Additional unit search paths
    #[arg(short = 'I', long = "search-path")]
    search_paths: Vec<PathBuf>,

    /// Configuration file (default: ./arguard.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not load the contracts of imported units
    #[arg(long)]
    no_follow_imports: bool,

    /// Report every extracted contract
    #[arg(long)]
    report_contracts: bool,

    /// Report conditions that could not be evaluated
    #[arg(long)]
    report_errors: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl From<ColorMode> for ColorChoice {
    fn from(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Auto => ColorChoice::Auto,
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check(args) => run(&args, false, cli.color.into()),
        Commands::Contracts(args) => run(&args, true, cli.color.into()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging disabled: {}", error);
    }
}

/// Merge the project file with command-line switches. Flags only ever turn
/// behavior on or off relative to the file.
fn analyzer_config(args: &UnitArgs, project: &ProjectConfig, contracts_only: bool) -> AnalyzerConfig {
    let mut config = project.analysis;
    if args.no_follow_imports {
        config.follow_imports = false;
    }
    config.report_contracts |= args.report_contracts || contracts_only;
    config.report_errors |= args.report_errors;
    config
}

fn search_paths(args: &UnitArgs, project: &ProjectConfig) -> Vec<PathBuf> {
    let mut paths = args.search_paths.clone();
    paths.extend(project.search_paths.iter().cloned());
    if paths.is_empty() {
        paths.push(PathBuf::from("."));
    }
    paths
}

fn run(args: &UnitArgs, contracts_only: bool, color: ColorChoice) -> ExitCode {
    let project = match ProjectConfig::discover(args.config.as_deref(), Path::new(".")) {
        Ok(project) => project,
        Err(error) => {
            eprintln!("error: {}", error);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let config = analyzer_config(args, &project, contracts_only);
    let frontend = SourceFrontend::new(FileSystemResolver::with_search_paths(search_paths(
        args, &project,
    )));
    let registry = FactRegistry::new();
    let analyzer = Analyzer::new(&frontend, &registry, config);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut totals = AnalysisStats::default();
    let mut failed = false;

    for unit in &args.units {
        match analyzer.analyze(unit, &mut diagnostics) {
            Ok(stats) => {
                totals.calls_checked += stats.calls_checked;
                totals.violations += stats.violations;
            }
            Err(FrontendError::Syntax { unit: name, message }) => {
                failed = true;
                match frontend.syntax_errors(&name) {
                    Ok(errors) if !errors.is_empty() => {
                        for error in &errors {
                            report_syntax_error(error);
                        }
                    }
                    _ => eprintln!("error: parse unit `{}`: {}", name, message),
                }
            }
            Err(error) => {
                failed = true;
                eprintln!("error: {}", error);
            }
        }
    }

    if contracts_only {
        diagnostics.retain(|d| d.kind == DiagnosticKind::Contract);
    }

    let mut renderer = TerminalRenderer::stdout(color);
    let rendered = renderer
        .render_all(&diagnostics)
        .and_then(|()| renderer.render_summary(&diagnostics));
    if let Err(error) = rendered {
        eprintln!("error: write diagnostics: {}", error);
        return ExitCode::from(EXIT_FAILURE);
    }
    tracing::debug!(
        units = args.units.len(),
        calls = totals.calls_checked,
        violations = totals.violations,
        "analysis finished"
    );

    if failed {
        return ExitCode::from(EXIT_FAILURE);
    }
    let summary = Summary::of(&diagnostics);
    if summary.violations + summary.internal_errors + summary.dependency_failures > 0 {
        ExitCode::from(EXIT_FINDINGS)
    } else {
        ExitCode::SUCCESS
    }
}

/// Report a syntax error using ariadne
fn report_syntax_error(error: &SyntaxError) {
    let filename = error.file.as_str();
    let source = error.source.as_str();
    let range = match error.error.span() {
        Some(span) => span.start..span.end.max(span.start + 1).min(source.len().max(1)),
        None => source.len().saturating_sub(1)..source.len(),
    };
    let (code, label) = match &error.error {
        ParseError::UnexpectedToken { expected, found, .. } => {
            ("E001", format!("expected {}, found `{}`", expected, found))
        }
        ParseError::UnexpectedEof { expected } => ("E002", format!("expected {} here", expected)),
        ParseError::Lexer { error, .. } => ("E003", error.to_string()),
        other => ("E004", other.to_string()),
    };

    let printed = Report::build(ReportKind::Error, filename, range.start)
        .with_code(code)
        .with_message("syntax error")
        .with_label(
            Label::new((filename, range))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)));
    if printed.is_err() {
        eprintln!("{}", error.describe());
    }
}
