//! # DPR Analyzer CLI (`dpra`)
//!
//! ## Usage
//!
//! ```bash
//! dpra --config ./config/dpra.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dpra init` | Create the SQLite database and run schema migrations |
//! | `dpra extract <file>` | Extract and normalize a document without analysis |
//! | `dpra analyze <file> --project <id>` | Run the full analysis pipeline |
//! | `dpra get <id>` | Print a stored report |
//! | `dpra list` | List stored reports |
//! | `dpra chat <id> "<question>"` | Ask a question about a stored report |
//! | `dpra completions <shell>` | Print shell completions |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dpr_analyzer::config::{self, parse_task_list, resolve_api_key, Config};
use dpr_analyzer::extract::TextExtractor;
use dpr_analyzer::format::media_type_for_path;
use dpr_analyzer::inference::HttpCompletionClient;
use dpr_analyzer::models::{ReportStatus, SourceDocument};
use dpr_analyzer::normalize::normalize;
use dpr_analyzer::ocr::TesseractOcr;
use dpr_analyzer::pipeline::Pipeline;
use dpr_analyzer::store::{ReportStore, SqliteReportStore};
use dpr_analyzer::{chat, db, migrate};

/// DPR Analyzer: extract, analyze, and store Detailed Project Reports.
#[derive(Parser)]
#[command(
    name = "dpra",
    about = "DPR Analyzer: document extraction and multi-task AI analysis for project reports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dpra.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the report database. Idempotent.
    Init,

    /// Extract and normalize a document without running any analysis.
    Extract {
        file: PathBuf,

        /// Declared media type. Defaults from the file extension.
        #[arg(long)]
        media_type: Option<String>,

        /// Print a JSON description instead of the raw text.
        #[arg(long)]
        json: bool,
    },

    /// Run the full analysis pipeline and store the report.
    Analyze {
        file: PathBuf,

        /// Project the report belongs to.
        #[arg(long)]
        project: String,

        #[arg(long)]
        media_type: Option<String>,

        /// Comma-separated task subset: summarize, risk, compliance, inconsistency.
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<String>,

        /// Print the report without saving it.
        #[arg(long)]
        no_save: bool,
    },

    /// Print a stored report as JSON.
    Get { id: String },

    /// List stored reports, newest first.
    List {
        #[arg(long)]
        project: Option<String>,

        /// In-Progress, Completed, or Failed.
        #[arg(long)]
        status: Option<String>,
    },

    /// Ask a question about a stored report.
    Chat { id: String, question: String },

    /// Print shell completions.
    Completions { shell: clap_complete::Shell },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "dpr_analyzer=debug"
    } else {
        "dpr_analyzer=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "dpra", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Extract {
            file,
            media_type,
            json,
        } => {
            // Extraction works without a config file, but a broken one is reported.
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                Config::minimal()
            };
            return run_extract(&cfg, file, media_type.as_deref(), *json).await;
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Analyze {
            file,
            project,
            media_type,
            tasks,
            no_save,
        } => {
            run_analyze(&cfg, &file, &project, media_type.as_deref(), &tasks, no_save).await?;
        }
        Commands::Get { id } => {
            let store = open_store(&cfg).await?;
            let report = store.get(&id).await?;
            store.close().await;
            match report {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => bail!("report not found: {}", id),
            }
        }
        Commands::List { project, status } => {
            let status = status
                .map(|s| s.parse::<ReportStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let store = open_store(&cfg).await?;
            let reports = store.list(project.as_deref(), status).await?;
            store.close().await;

            if reports.is_empty() {
                println!("No reports found.");
            }
            for r in &reports {
                println!(
                    "{}  {:<11}  compliance={:<5}  risk={:<5}  {}  ({})",
                    r.id,
                    r.status,
                    fmt_score(r.compliance_score),
                    fmt_score(r.risk_percentage),
                    r.original_filename,
                    r.created_at
                );
            }
        }
        Commands::Chat { id, question } => {
            let store = open_store(&cfg).await?;
            let report = store.get(&id).await?;
            store.close().await;
            let Some(report) = report else {
                bail!("report not found: {}", id);
            };
            let client = HttpCompletionClient::new(&cfg.inference, resolve_api_key(&cfg.inference)?)?;
            let answer = chat::ask_about_report(&client, &report, &question).await?;
            println!("{}", answer);
        }
        Commands::Completions { .. } | Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

async fn read_document(file: &Path, media_type: Option<&str>) -> Result<SourceDocument> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let media_type = media_type
        .map(str::to_string)
        .unwrap_or_else(|| media_type_for_path(file).to_string());
    Ok(SourceDocument::new(bytes, media_type, filename))
}

async fn run_extract(cfg: &Config, file: &Path, media_type: Option<&str>, json: bool) -> Result<()> {
    let doc = read_document(file, media_type).await?;
    let extractor = TextExtractor::new(Arc::new(TesseractOcr::new(&cfg.extraction)));
    let outcome = extractor.extract(&doc).await;
    let payload = normalize(&outcome, cfg.extraction.max_chars)?;

    if json {
        let out = serde_json::json!({
            "file": doc.filename(),
            "mediaType": doc.media_type(),
            "sha256": doc.sha256(),
            "method": outcome.method(),
            "pageCount": outcome.page_count(),
            "chars": payload.char_count(),
            "truncated": payload.truncated(),
            "text": payload.as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", payload.as_str());
    }
    Ok(())
}

async fn run_analyze(
    cfg: &Config,
    file: &Path,
    project: &str,
    media_type: Option<&str>,
    tasks: &[String],
    no_save: bool,
) -> Result<()> {
    // Credential problems surface before any document work or network call.
    let api_key = resolve_api_key(&cfg.inference)?;
    let backend = Arc::new(HttpCompletionClient::new(&cfg.inference, api_key)?);
    let pipeline = Pipeline::from_config(cfg, Arc::new(TesseractOcr::new(&cfg.extraction)), backend)?;

    let tasks = if tasks.is_empty() {
        pipeline.tasks().clone()
    } else {
        parse_task_list(tasks)?
    };

    let doc = read_document(file, media_type).await?;
    let report = match pipeline.run_tasks(doc, &tasks).await {
        Ok(report) => report,
        Err(e) if e.is_caller_error() => bail!("document rejected: {}", e),
        Err(e) => return Err(e.into()),
    };

    if !no_save {
        let store = open_store(cfg).await?;
        store.save(project, &report).await?;
        store.close().await;
        tracing::info!(report = %report.id, project, "report saved");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn open_store(cfg: &Config) -> Result<SqliteReportStore> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;
    Ok(SqliteReportStore::new(pool))
}

fn fmt_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.0}", s)).unwrap_or_else(|| "-".to_string())
}
