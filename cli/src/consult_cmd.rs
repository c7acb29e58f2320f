//! `faculty consult`, `faculty ritual` and `faculty fingerprint`.

use anyhow::Context;
use clap::Parser;
use faculty_engine::{
    AnalysisDepth, ConsultOptions, ConsultationOutcome, FacultyConfig, FacultyEngine,
    RepositoryContext, RoleSelection,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
pub struct ConsultArgs {
    /// Repository context JSON produced by the collector
    #[arg(long, value_name = "PATH")]
    pub context: PathBuf,

    /// Consultants to run: advisor, oracle or both
    #[arg(long, default_value = "both")]
    pub roles: RoleSelection,

    /// Audit depth: quick, standard or deep
    #[arg(long, default_value = "standard")]
    pub depth: AnalysisDepth,

    /// Free-form label recorded in the report
    #[arg(long)]
    pub scope: Option<String>,

    /// Override the configured wall-clock budget
    #[arg(long, value_name = "MINUTES")]
    pub budget_minutes: Option<f64>,

    /// Previous context snapshot; a trivial delta reuses its cached results
    #[arg(long, value_name = "PATH")]
    pub baseline: Option<PathBuf>,

    /// Use in-memory stores and write nothing
    #[arg(long)]
    pub preview: bool,

    /// Directory for the consolidated report files
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the report as JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct RitualArgs {
    /// Repository context JSON produced by the collector
    #[arg(long, value_name = "PATH")]
    pub context: PathBuf,

    /// Visions to attempt (default: oracle.ritual_max_items)
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Override the configured wall-clock budget
    #[arg(long, value_name = "MINUTES")]
    pub budget_minutes: Option<f64>,

    /// Directory for the ritual report files
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the report as JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct FingerprintArgs {
    /// Repository context JSON produced by the collector
    #[arg(long, value_name = "PATH")]
    pub context: PathBuf,
}

pub fn run_consult(args: ConsultArgs, config: FacultyConfig) -> anyhow::Result<u8> {
    let context = load_context(&args.context)?;
    let baseline = args.baseline.as_deref().map(load_context).transpose()?;

    let mut engine = if args.preview {
        FacultyEngine::preview(config)?
    } else {
        FacultyEngine::open(config).context("failed to open faculty state")?
    };

    let options = ConsultOptions {
        roles: args.roles,
        depth: args.depth,
        scope: args.scope,
        budget_minutes: args.budget_minutes,
        baseline,
        preview: args.preview,
        output_dir: args.output,
        max_items: None,
    };
    let outcome = engine.consult(&context, &options)?;
    print_outcome(&outcome, args.json)
}

pub fn run_ritual(args: RitualArgs, config: FacultyConfig) -> anyhow::Result<u8> {
    let context = load_context(&args.context)?;
    let mut engine = FacultyEngine::open(config).context("failed to open faculty state")?;

    let options = ConsultOptions {
        budget_minutes: args.budget_minutes,
        output_dir: args.output,
        max_items: args.max_items,
        ..ConsultOptions::default()
    };
    let outcome = engine.run_ritual(&context, &options)?;
    print_outcome(&outcome, args.json)
}

pub fn run_fingerprint(args: &FingerprintArgs) -> anyhow::Result<u8> {
    let context = load_context(&args.context)?;
    println!("{}", context.fingerprint()?);
    Ok(0)
}

fn load_context(path: &Path) -> anyhow::Result<RepositoryContext> {
    Ok(RepositoryContext::load(path)?)
}

fn print_outcome(outcome: &ConsultationOutcome, json: bool) -> anyhow::Result<u8> {
    if json {
        println!("{}", outcome.report.to_json()?);
    } else {
        print!("{}", outcome.report.to_markdown());
        for path in &outcome.written {
            eprintln!("Wrote {}", path.display());
        }
    }
    Ok(outcome.exit.code() as u8)
}
