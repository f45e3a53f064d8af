//! CLI entry point for kokufuku.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use kokufuku::ai::AIProvider;
use kokufuku::reporting::{AnalysisReport, ReportGenerator, markdown};
use kokufuku::{
    Analysis, AnalysisConfig, GenerationOutcome, IngestReport, Session, SummaryRow,
    collect_uploads, load_grading_images, score_rate,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(feature = "ai")]
use kokufuku::ai::{GeminiConfig, GeminiProvider, OpenRouterConfig, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::env;

/// Which completion backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Google Gemini (GEMINI_API_KEY)
    Gemini,
    /// OpenRouter (OPENROUTER_API_KEY)
    Openrouter,
    /// No AI: raw topic labels, no guidance
    None,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Exam score analysis and AI study guidance",
    long_about = "Load exam score CSV sheets, find weak topics and generate study material.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  GEMINI_API_KEY        API key for Google Gemini (default provider)\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter (--provider openrouter)\n\n\
                  EXAMPLES:\n  \
                  # Summarize every CSV in a folder\n  \
                  kokufuku summary ./kokufuku\n\n  \
                  # Review guidance for the weakest topic\n  \
                  kokufuku guide ./kokufuku --textbook 数学=チャート式\n\n  \
                  # Grade an answer sheet from photos\n  \
                  kokufuku grade problem.jpg answer.jpg model_answer.jpg"
)]
struct Cli {
    /// JSON configuration file (subject rules, taxonomy, exam profile, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Completion backend
    #[arg(long, value_enum, default_value = "gemini", global = true)]
    provider: ProviderKind,

    /// Model identifier passed to the provider
    #[arg(long, global = true)]
    model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors in the log
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Where the score data comes from.
#[derive(ClapArgs, Debug)]
struct DataArgs {
    /// CSV files or folders containing CSV files
    paths: Vec<PathBuf>,

    /// Restore a previously exported session snapshot first
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Textbook per subject, e.g. `--textbook 数学=チャート式`
    #[arg(long = "textbook", value_parser = parse_key_value)]
    textbooks: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print topic and subject score rates
    Summary {
        #[command(flatten)]
        data: DataArgs,

        /// Write summary CSVs and report.json to this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Review guidance for one topic (weakest topic by default)
    Guide {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        target: TopicArgs,
    },

    /// Generate one practice problem with solution
    Test {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        target: TopicArgs,
    },

    /// Study schedule until the exam date
    Schedule {
        #[command(flatten)]
        data: DataArgs,

        /// Start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Grade an answer sheet from 2-3 images
    Grade {
        /// Image files (problem, student answer, model answer)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Export or inspect session snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(ClapArgs, Debug)]
struct TopicArgs {
    /// Subject label, e.g. 数学
    #[arg(long, requires = "topic")]
    subject: Option<String>,

    /// Canonical topic label, e.g. 関数
    #[arg(long, requires = "subject")]
    topic: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// Load data and write a snapshot blob
    Export {
        #[command(flatten)]
        data: DataArgs,

        /// Destination file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Restore a snapshot and print what it contains
    Show {
        /// Snapshot file
        file: PathBuf,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected SUBJECT=NAME, got '{}'", raw))
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` overrides the `--log-level` flag.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    // Load environment variables from .env file
    dotenv().ok();

    let config = load_config(cli.config.as_deref())?;
    let provider = build_provider(&cli)?;
    let provider = provider.as_deref();

    match &cli.command {
        Command::Summary { data, output, json } => {
            let (mut session, ingest) = load_scores(config, data)?;
            let analysis = session.analyze(provider)?;
            run_summary(&session, ingest, analysis, output.as_deref(), *json)
        }
        Command::Guide { data, target } => {
            let (mut session, _) = load_scores(config, data)?;
            let analysis = session.analyze(provider)?;
            let row = select_topic(&analysis, target)?;
            let outcome = session.advisor(provider).review_guidance(
                &row.subject,
                &row.topic,
                row.percentage,
                session.textbook(&row.subject),
            );
            print_outcome(&format!("{} / {} ({:.1}%)", row.subject, row.topic, row.percentage), &outcome)
        }
        Command::Test { data, target } => {
            let (mut session, _) = load_scores(config, data)?;
            let analysis = session.analyze(provider)?;
            let row = select_topic(&analysis, target)?;
            let outcome = session
                .advisor(provider)
                .practice_test(&row.subject, &row.topic);
            print_outcome(&format!("{} / {}", row.subject, row.topic), &outcome)
        }
        Command::Schedule { data, today } => {
            let (mut session, _) = load_scores(config, data)?;
            let analysis = session.analyze(provider)?;
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let outcome = session
                .advisor(provider)
                .study_schedule(today, &analysis.priority);
            print_outcome(
                &format!("{} → {}", today, session.config().exam.exam_date),
                &outcome,
            )
        }
        Command::Grade { images } => {
            let images = load_grading_images(images)?;
            let session = Session::new(config);
            let outcome = session.advisor(provider).grade_images(&images);
            print_outcome("採点結果", &outcome)
        }
        Command::Snapshot { action } => run_snapshot(config, provider, action),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            AnalysisConfig::from_json_file(path)?
        }
        None => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Build the selected provider, or `None` when no API key is available.
#[cfg(feature = "ai")]
fn build_provider(cli: &Cli) -> Result<Option<Box<dyn AIProvider>>> {
    let key_var = match cli.provider {
        ProviderKind::None => {
            info!("Running without AI provider");
            return Ok(None);
        }
        ProviderKind::Gemini => "GEMINI_API_KEY",
        ProviderKind::Openrouter => "OPENROUTER_API_KEY",
    };

    let api_key = match env::var(key_var) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!("{} not set. AI features are disabled.", key_var);
            return Ok(None);
        }
    };

    let provider: Box<dyn AIProvider> = match cli.provider {
        ProviderKind::Gemini => {
            let mut builder = GeminiConfig::builder();
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            Box::new(GeminiProvider::with_config(api_key, builder.build())?)
        }
        _ => {
            let mut builder = OpenRouterConfig::builder();
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            Box::new(OpenRouterProvider::with_config(api_key, builder.build())?)
        }
    };

    info!(
        "Using {} ({})",
        provider.name(),
        provider.model().unwrap_or("default model")
    );
    Ok(Some(provider))
}

/// Without the "ai" feature there are no HTTP providers.
#[cfg(not(feature = "ai"))]
fn build_provider(cli: &Cli) -> Result<Option<Box<dyn AIProvider>>> {
    if cli.provider != ProviderKind::None {
        warn!("AI support not compiled in. Compile with --features ai to enable it.");
    }
    Ok(None)
}

/// Build a session from a snapshot and/or CSV paths.
fn load_session(config: AnalysisConfig, data: &DataArgs) -> Result<(Session, IngestReport)> {
    let mut session = Session::new(config);
    debug!("Created session {}", session.id());

    if let Some(path) = &data.snapshot {
        let blob = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        session.import_snapshot(&blob)?;
    }

    for (subject, name) in &data.textbooks {
        session.set_textbook(subject.as_str(), name.as_str());
    }

    let uploads = collect_uploads(&data.paths)?;
    let ingest = session.ingest(&uploads);
    if !uploads.is_empty() {
        println!("{}", ingest.summary_message());
    }
    Ok((session, ingest))
}

/// Like [`load_session`], for commands that need at least one score record.
fn load_scores(config: AnalysisConfig, data: &DataArgs) -> Result<(Session, IngestReport)> {
    let (session, ingest) = load_session(config, data)?;
    if session.record_count() == 0 {
        bail!("No score data loaded. Pass CSV files or a folder containing them.");
    }
    Ok((session, ingest))
}

/// Use `--subject/--topic` if given, otherwise the weakest topic.
fn select_topic(analysis: &Analysis, target: &TopicArgs) -> Result<SummaryRow> {
    match (&target.subject, &target.topic) {
        (Some(subject), Some(topic)) => analysis
            .summary
            .topic(subject, topic)
            .cloned()
            .ok_or_else(|| anyhow!("No scores for {} / {}", subject, topic)),
        _ => analysis
            .priority
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No topics to review")),
    }
}

/// Note: uses `println!` for user-facing output, independent of log level.
fn run_summary(
    session: &Session,
    ingest: IngestReport,
    analysis: Analysis,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    if let Some(warning) = &analysis.canonicalization.warning {
        warn!("{}", warning);
    }

    let exam = &session.config().exam;
    let report = AnalysisReport::new(ingest, analysis, &exam.target_school, exam.exam_date);

    if let Some(dir) = output {
        let generator = ReportGenerator::new(dir);
        generator.write_summary_csv(&report.by_topic, &report.by_subject)?;
        generator.write_report_json(&report)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let total_score: f64 = report.by_subject.iter().map(|r| r.score).sum();
    let total_max: f64 = report.by_subject.iter().map(|r| r.max_score).sum();

    println!("\n{}", "=".repeat(60));
    println!("{} 合格ストラテジー", exam.target_school);
    println!("{}", "=".repeat(60));
    println!(
        "入試日: {}  /  全体得点率: {:.1}%\n",
        exam.exam_date,
        score_rate(total_score, total_max)
    );

    println!("優先復習単元");
    println!("{}", markdown::topic_table(&report.priority));
    println!("教科別");
    println!("{}", markdown::subject_table(&report.by_subject));
    println!("単元別");
    println!("{}", markdown::topic_table(&report.by_topic));
    Ok(())
}

fn print_outcome(title: &str, outcome: &GenerationOutcome) -> Result<()> {
    println!("\n## {}\n", title);
    println!("{}", outcome);
    match outcome {
        GenerationOutcome::Text(_) => Ok(()),
        _ => bail!("generation did not produce an answer"),
    }
}

fn run_snapshot(
    config: AnalysisConfig,
    provider: Option<&dyn AIProvider>,
    action: &SnapshotAction,
) -> Result<()> {
    match action {
        SnapshotAction::Export { data, out } => {
            let (mut session, _) = load_scores(config, data)?;
            // Classify topics first so the snapshot carries the topic map
            let (report, blob) = session.export_analyzed_snapshot(provider)?;
            if let Some(warning) = &report.warning {
                warn!("{}", warning);
            }
            std::fs::write(out, blob)
                .with_context(|| format!("Failed to write snapshot {}", out.display()))?;
            println!(
                "Snapshot written to {} ({} files, {} records)",
                out.display(),
                session.file_names().count(),
                session.record_count()
            );
            Ok(())
        }
        SnapshotAction::Show { file } => {
            let data = DataArgs {
                paths: Vec::new(),
                snapshot: Some(file.clone()),
                textbooks: Vec::new(),
            };
            let (session, _) = load_session(config, &data)?;
            println!("Files:");
            for name in session.file_names() {
                println!("  {}", name);
            }
            println!("Textbooks:");
            for (subject, name) in session.textbooks() {
                println!("  {}: {}", subject, name);
            }
            println!("Topic mappings: {}", session.topic_map().len());
            Ok(())
        }
    }
}
