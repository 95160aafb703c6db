use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ta_marking::config::{DelayRange, MarkingConfig, DEFAULT_QUESTIONS_PER_EXAM, DEFAULT_SENTINEL};
use ta_marking::exam::{DirExamSource, ExamId};
use ta_marking::rubric::FileRubricSource;
use ta_marking::seed::{seed_fixtures, RUBRIC_FILE};
use ta_marking::shutdown::install_shutdown_handler;
use ta_marking::MarkingSession;

#[derive(Parser, Debug)]
#[command(name = "ta-marking")]
#[command(version)]
#[command(about = "Concurrent exam marking with a shared, correctable rubric")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Mark every exam in a directory with concurrent markers
    Run(RunArgs),

    /// Write a demo exam pile and rubric into a directory
    Seed(SeedArgs),
}

// =============================================================================
// Run Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct RunArgs {
    /// Number of concurrent markers (at least 2)
    workers: usize,

    /// Directory containing exam_*.txt files
    #[arg(long, default_value = ".")]
    exams_dir: PathBuf,

    /// Rubric file, rewritten after every correction
    #[arg(long, default_value = RUBRIC_FILE)]
    rubric: PathBuf,

    /// Questions per exam when the exam header does not say
    #[arg(long, default_value_t = DEFAULT_QUESTIONS_PER_EXAM)]
    questions: usize,

    /// Student number of the exam that ends the pile
    #[arg(long, default_value_t = DEFAULT_SENTINEL.0)]
    sentinel: u32,

    /// Minimum time to review one rubric line
    #[arg(long, default_value = "500")]
    review_min_ms: u64,

    /// Maximum time to review one rubric line
    #[arg(long, default_value = "1000")]
    review_max_ms: u64,

    /// Minimum time to mark one question
    #[arg(long, default_value = "1000")]
    mark_min_ms: u64,

    /// Maximum time to mark one question
    #[arg(long, default_value = "2000")]
    mark_max_ms: u64,

    /// Chance that a reviewed rubric line gets corrected
    #[arg(long, default_value = "0.3")]
    correction_probability: f64,

    /// Output format for the run summary
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Seed Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct SeedArgs {
    /// Directory to write into (created if missing)
    dir: PathBuf,

    /// Number of regular exams before the sentinel exam
    #[arg(long, default_value = "5")]
    exams: usize,

    /// Questions per exam
    #[arg(long, default_value_t = DEFAULT_QUESTIONS_PER_EXAM)]
    questions: usize,

    /// Number of rubric lines
    #[arg(long, default_value = "5")]
    rubric_lines: usize,

    /// Student number of the final exam
    #[arg(long, default_value_t = DEFAULT_SENTINEL.0)]
    sentinel: u32,
}

// =============================================================================
// Command Implementations
// =============================================================================

async fn run_marking(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = MarkingConfig::new(args.workers)
        .with_sentinel(ExamId(args.sentinel))
        .with_questions_per_exam(args.questions)
        .with_review_delay(DelayRange::new(args.review_min_ms, args.review_max_ms))
        .with_marking_delay(DelayRange::new(args.mark_min_ms, args.mark_max_ms))
        .with_correction_probability(args.correction_probability);

    tracing::info!(
        workers = config.workers,
        exams_dir = %args.exams_dir.display(),
        rubric = %args.rubric.display(),
        "Starting marking run"
    );

    let exams = Arc::new(DirExamSource::new(&args.exams_dir, config.questions_per_exam));
    let rubric = Arc::new(FileRubricSource::new(&args.rubric));
    let session = MarkingSession::open(config, exams, rubric).await?;

    install_shutdown_handler(session.termination());
    let report = session.run().await?;

    match args.output {
        OutputFormat::Table => print!("{}", report.render_table()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

async fn run_seed(args: SeedArgs) -> Result<(), Box<dyn std::error::Error>> {
    let summary = seed_fixtures(
        &args.dir,
        args.exams,
        args.questions,
        args.rubric_lines,
        ExamId(args.sentinel),
    )
    .await?;

    for path in &summary.exam_files {
        println!("{}", path.display());
    }
    println!("{}", summary.rubric_file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match args.command {
        Commands::Run(run_args) => run_marking(run_args).await?,
        Commands::Seed(seed_args) => run_seed(seed_args).await?,
    }

    Ok(())
}
