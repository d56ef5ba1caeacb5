use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{AnalysisTask, ReportStatus};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    #[serde(default = "default_pdftoppm_bin")]
    pub pdftoppm_bin: String,
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            ocr_language: default_ocr_language(),
            ocr_dpi: default_ocr_dpi(),
            pdftoppm_bin: default_pdftoppm_bin(),
            tesseract_bin: default_tesseract_bin(),
        }
    }
}

fn default_max_chars() -> usize {
    15_000
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_dpi() -> u32 {
    300
}
fn default_pdftoppm_bin() -> String {
    "pdftoppm".to_string()
}
fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Literal bearer credential. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.a4f.co/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "provider-3/gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "A4F_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Overall analysis deadline. `0` disables it.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_initial_status")]
    pub initial_status: String,
    #[serde(default = "default_tasks")]
    pub tasks: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            initial_status: default_initial_status(),
            tasks: default_tasks(),
        }
    }
}

fn default_deadline_secs() -> u64 {
    180
}
fn default_initial_status() -> String {
    "In-Progress".to_string()
}
fn default_tasks() -> Vec<String> {
    AnalysisTask::ALL
        .iter()
        .map(|t| t.as_str().to_string())
        .collect()
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }

    pub fn initial_status(&self) -> Result<ReportStatus> {
        let status: ReportStatus = self
            .initial_status
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        if status == ReportStatus::Failed {
            bail!("pipeline.initial_status must be Completed or In-Progress");
        }
        Ok(status)
    }

    pub fn task_set(&self) -> Result<BTreeSet<AnalysisTask>> {
        parse_task_list(&self.tasks)
    }
}

/// Parse task names into a set, rejecting unknown names and empty lists.
pub fn parse_task_list<S: AsRef<str>>(names: &[S]) -> Result<BTreeSet<AnalysisTask>> {
    let mut tasks = BTreeSet::new();
    for name in names {
        let task: AnalysisTask = name
            .as_ref()
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        tasks.insert(task);
    }
    if tasks.is_empty() {
        bail!("at least one analysis task must be requested");
    }
    Ok(tasks)
}

impl Config {
    /// Config used by commands that never touch the database or the endpoint.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/dpra.sqlite"),
            },
            extraction: ExtractionConfig::default(),
            inference: InferenceConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.extraction.max_chars == 0 {
        bail!("extraction.max_chars must be > 0");
    }

    if config.extraction.ocr_dpi == 0 {
        bail!("extraction.ocr_dpi must be > 0");
    }

    if config.inference.endpoint.trim().is_empty() {
        bail!("inference.endpoint must not be empty");
    }

    if config.inference.model.trim().is_empty() {
        bail!("inference.model must not be empty");
    }

    if config.inference.request_timeout_secs == 0 {
        bail!("inference.request_timeout_secs must be > 0");
    }

    if !(0.0..=2.0).contains(&config.inference.temperature) {
        bail!("inference.temperature must be in [0.0, 2.0]");
    }

    config.pipeline.initial_status()?;
    config.pipeline.task_set()?;

    Ok(())
}

/// Resolve the bearer credential for the inference endpoint.
///
/// A literal `api_key` wins; otherwise the variable named by `api_key_env`
/// is read. A missing or blank credential is a configuration error.
pub fn resolve_api_key(config: &InferenceConfig) -> Result<String> {
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!(
            "no inference credential: set inference.api_key or the {} environment variable",
            config.api_key_env
        ),
    }
}
