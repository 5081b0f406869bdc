//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use triage_classifier::{Classifier, ClassifierSettings, load_samples, rule_catalog};
use triage_core::{
    BatchReport, PipelineContext, ProgressReporter, classify_batch, classify_path, classify_text,
    collect_inputs, explain_path, explain_text,
};
use triage_shared::{
    AppConfig, ClassificationResult, FileFormat, expand_home, init_config, load_config,
    load_config_from,
};
use triage_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Triage: route customer documents with a calibrated confidence score.
#[derive(Parser)]
#[command(
    name = "triage",
    version,
    about = "Classify customer documents as invoice, support ticket or feature request.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.triage/triage.toml).
    #[arg(long, global = true, env = "TRIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override classifier.review_threshold.
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Classify one document and print the JSON result.
    Classify {
        /// Document to classify.
        #[arg(required_unless_present = "text", conflicts_with = "text")]
        path: Option<PathBuf>,

        /// Classify inline text instead of a file.
        #[arg(long)]
        text: Option<String>,

        /// Declared format of inline text: text, pdf or image.
        #[arg(long, value_parser = parse_format, requires = "text")]
        format: Option<FileFormat>,

        /// Also print the evidence behind the scores.
        #[arg(long)]
        explain: bool,

        /// Do not record the result in the history database.
        #[arg(long)]
        no_store: bool,
    },

    /// Classify many documents in parallel; prints JSON Lines.
    Batch {
        /// Files or directories (one level deep).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Override batch.concurrency.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Do not record results in the history database.
        #[arg(long)]
        no_store: bool,
    },

    /// Train a model from labeled samples and save it.
    Train {
        /// Labeled samples (JSON array or JSON Lines).
        #[arg(long)]
        data: PathBuf,

        /// Where to write the model file.
        #[arg(long)]
        out: PathBuf,

        /// Train on the given samples only, without the built-in corpus.
        #[arg(long)]
        no_seed: bool,
    },

    /// Measure accuracy and calibration on labeled samples.
    Eval {
        /// Labeled samples (JSON array or JSON Lines).
        #[arg(long)]
        data: PathBuf,

        /// Model file (defaults to classifier.model_path, then the built-in model).
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Show recorded classifications.
    History {
        /// Maximum number of records.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only results awaiting human review.
        #[arg(long)]
        needs_review: bool,

        /// Print per-category totals instead of records.
        #[arg(long)]
        counts: bool,
    },

    /// List the routing rules and their weights.
    Rules,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_format(s: &str) -> std::result::Result<FileFormat, String> {
    s.parse().map_err(|e: triage_shared::TriageError| e.to_string())
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "triage=info,triage_core=info,triage_classifier=info",
        1 => {
            "triage=debug,triage_core=debug,triage_classifier=debug,triage_ingest=debug,\
             triage_storage=debug"
        }
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    // Must work even when the existing file is invalid.
    if let Command::Config {
        action: ConfigAction::Init,
    } = &cli.command
    {
        return cmd_config_init();
    }

    let config = resolve_config(cli.config.as_deref(), cli.threshold)?;

    match cli.command {
        Command::Classify {
            path,
            text,
            format,
            explain,
            no_store,
        } => {
            let input = match (path, text) {
                (Some(path), _) => Input::Path(path),
                (None, Some(text)) => Input::Text(text, format.unwrap_or(FileFormat::Text)),
                (None, None) => return Err(eyre!("provide a document path or --text")),
            };
            cmd_classify(config, input, explain, no_store).await
        }
        Command::Batch {
            paths,
            concurrency,
            no_store,
        } => cmd_batch(config, &paths, concurrency, no_store).await,
        Command::Train {
            data,
            out,
            no_seed,
        } => cmd_train(&config, &data, &out, no_seed).await,
        Command::Eval { data, model } => cmd_eval(&config, &data, model.as_deref()).await,
        Command::History {
            limit,
            needs_review,
            counts,
        } => cmd_history(&config, limit, needs_review, counts).await,
        Command::Rules => cmd_rules(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load the config file (explicit path or default location) and apply
/// command-line overrides.
fn resolve_config(path: Option<&Path>, threshold: Option<f64>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    if let Some(t) = threshold {
        config.classifier.review_threshold = t;
    }
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// classify / batch
// ---------------------------------------------------------------------------

enum Input {
    Path(PathBuf),
    Text(String, FileFormat),
}

async fn cmd_classify(
    mut config: AppConfig,
    input: Input,
    explain: bool,
    no_store: bool,
) -> Result<()> {
    if no_store {
        config.storage.enabled = false;
    }
    let ctx = PipelineContext::from_config(&config).await?;

    let result = match &input {
        Input::Path(path) => classify_path(path, &ctx).await?,
        Input::Text(text, format) => classify_text(text, *format, &ctx).await?,
    };
    info!(
        category = %result.document_type(),
        confidence = result.confidence_score(),
        disposition = result.disposition().as_str(),
        "classified"
    );

    if explain {
        let explanation = match &input {
            Input::Path(path) => explain_path(path, &ctx).await?,
            Input::Text(text, format) => explain_text(text, *format, &ctx)?,
        };
        let output = json!({ "result": result, "explanation": explanation });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

async fn cmd_batch(
    mut config: AppConfig,
    paths: &[PathBuf],
    concurrency: Option<usize>,
    no_store: bool,
) -> Result<()> {
    apply_batch_overrides(&mut config, concurrency, no_store)?;

    let inputs = collect_inputs(paths, &config.ingest.sidecar_suffix)?;
    if inputs.is_empty() {
        return Err(eyre!("no documents found in the given paths"));
    }

    let ctx = PipelineContext::from_config(&config).await?;
    let reporter = CliProgress::new();
    let report = classify_batch(&inputs, &ctx, &reporter).await;

    for item in &report.items {
        let line = match &item.outcome {
            Ok(result) => batch_line(&item.path, result)?,
            Err(e) => json!({ "path": item.path.display().to_string(), "error": e.to_string() }),
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    let summary = report.summary();
    eprintln!();
    eprintln!("  Documents:    {}", summary.total);
    eprintln!("  Classified:   {}", summary.classified);
    eprintln!("  Needs review: {}", summary.needs_review);
    eprintln!("  Failed:       {}", summary.failed);
    for (category, n) in &summary.per_category {
        eprintln!("  {:<14}{n}", format!("{category}:"));
    }
    eprintln!("  Time:         {:.1}s", report.elapsed.as_secs_f64());
    eprintln!();

    if summary.failed > 0 {
        return Err(eyre!(
            "{} of {} documents could not be classified",
            summary.failed,
            summary.total
        ));
    }
    Ok(())
}

/// Apply `batch` flags on top of the loaded config.
fn apply_batch_overrides(
    config: &mut AppConfig,
    concurrency: Option<usize>,
    no_store: bool,
) -> Result<()> {
    if no_store {
        config.storage.enabled = false;
    }
    if let Some(n) = concurrency {
        config.batch.concurrency = n;
    }
    config.validate()?;
    Ok(())
}

fn batch_line(path: &Path, result: &ClassificationResult) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(result)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("path".into(), json!(path.display().to_string()));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Batch progress bar drawn on stderr.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("classifying");
    }

    fn document_done(&self, path: &Path, current: usize, _total: usize, ok: bool) {
        self.bar.set_position(current as u64);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar
            .set_message(if ok { name } else { format!("{name} (failed)") });
    }

    fn done(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// train / eval
// ---------------------------------------------------------------------------

async fn cmd_train(config: &AppConfig, data: &Path, out: &Path, no_seed: bool) -> Result<()> {
    let samples = load_samples(data)?;
    info!(samples = samples.len(), no_seed, "training classifier");

    let settings = ClassifierSettings::from(&config.classifier);
    let classifier = tokio::task::spawn_blocking(move || {
        if no_seed {
            Classifier::train_only(&samples, settings)
        } else {
            Classifier::train(&samples, settings)
        }
    })
    .await??;
    classifier.save(out)?;

    println!();
    println!("  Model trained!");
    println!("  Samples:     {}", classifier.sample_count());
    println!("  Vocabulary:  {}", classifier.vocabulary_size());
    println!("  Temperature: {:.2}", classifier.fitted_temperature());
    println!("  Path:        {}", out.display());
    println!();
    Ok(())
}

async fn cmd_eval(config: &AppConfig, data: &Path, model: Option<&Path>) -> Result<()> {
    let samples = load_samples(data)?;
    let classifier = match model {
        Some(path) => Classifier::load(path, ClassifierSettings::from(&config.classifier))?,
        None => Classifier::from_config(&config.classifier)?,
    };
    info!(samples = samples.len(), "evaluating classifier");

    let report = classifier.evaluate(&samples);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// history / rules
// ---------------------------------------------------------------------------

async fn cmd_history(
    config: &AppConfig,
    limit: usize,
    needs_review: bool,
    counts: bool,
) -> Result<()> {
    let db_path = expand_home(&config.storage.db_path);
    let storage = Storage::open_readonly(&db_path).await?;

    if counts {
        let counts = storage.category_counts().await?;
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    for record in storage.list_recent(limit, needs_review).await? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn cmd_rules() -> Result<()> {
    for (name, category, weight) in rule_catalog() {
        println!("{:<18} {:<16} {weight:.2}", name, category.as_str());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_inline_classify() {
        let cli = Cli::parse_from([
            "triage", "classify", "--text", "Invoice #1", "--format", "pdf", "--explain",
        ]);
        match cli.command {
            Command::Classify {
                path,
                text,
                format,
                explain,
                ..
            } => {
                assert!(path.is_none());
                assert_eq!(text.as_deref(), Some("Invoice #1"));
                assert_eq!(format, Some(FileFormat::Pdf));
                assert!(explain);
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn rejects_unknown_format() {
        let parsed = Cli::try_parse_from(["triage", "classify", "--text", "x", "--format", "docx"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn classify_needs_an_input() {
        assert!(Cli::try_parse_from(["triage", "classify"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "triage",
            "history",
            "--needs-review",
            "-vv",
            "--threshold",
            "0.9",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threshold, Some(0.9));
    }

    #[test]
    fn threshold_override_is_validated() {
        let path = std::env::temp_dir().join(format!("triage_cli_{}.toml", std::process::id()));
        std::fs::write(&path, "[batch]\nconcurrency = 2\n").unwrap();

        let config = resolve_config(Some(&path), Some(0.6)).unwrap();
        assert_eq!(config.classifier.review_threshold, 0.6);
        assert_eq!(config.batch.concurrency, 2);

        assert!(resolve_config(Some(&path), Some(1.5)).is_err());
        std::fs::remove_file(&path).ok();
    }

    fn batch_flags(args: &[&str]) -> (Option<usize>, bool) {
        match Cli::parse_from(args).command {
            Command::Batch {
                concurrency,
                no_store,
                ..
            } => (concurrency, no_store),
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn batch_concurrency_flag_overrides_config() {
        let (concurrency, no_store) =
            batch_flags(&["triage", "batch", "inbox", "--concurrency", "8", "--no-store"]);
        let mut config = AppConfig::default();
        apply_batch_overrides(&mut config, concurrency, no_store).unwrap();
        assert_eq!(config.batch.concurrency, 8);
        assert!(!config.storage.enabled);

        let classifier = Classifier::with_seed_corpus(ClassifierSettings::default()).unwrap();
        let ctx = PipelineContext::new(std::sync::Arc::new(classifier), &config).unwrap();
        assert_eq!(ctx.concurrency, 8);
    }

    #[test]
    fn batch_without_flags_keeps_config() {
        let (concurrency, no_store) = batch_flags(&["triage", "batch", "inbox"]);
        let mut config = AppConfig::default();
        apply_batch_overrides(&mut config, concurrency, no_store).unwrap();
        assert_eq!(config.batch.concurrency, AppConfig::default().batch.concurrency);
        assert!(config.storage.enabled);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let (concurrency, no_store) =
            batch_flags(&["triage", "batch", "inbox", "--concurrency", "0"]);
        let mut config = AppConfig::default();
        assert!(apply_batch_overrides(&mut config, concurrency, no_store).is_err());
    }
}
