//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__RRF_K`).
//! The merged result is extracted once into [`Settings`], validated, and passed
//! by reference into each component's constructor.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::load_from(Path::new("."), &env_name))
    }

    /// Loads the layered configuration rooted at `dir` for the given environment.
    pub fn load_from(dir: &Path, env_name: &str) -> Self {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self { figment, env_name: env_name.to_string() }
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    /// Extracts and validates the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub evaluation: EvaluationSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.evaluation.validate()?;
        self.data.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self { Self { chunk_size: 300, overlap: 50, min_chunk_size: 200 } }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size must be > 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(invalid(format!("chunking.overlap ({}) must be smaller than chunk_size ({})", self.overlap, self.chunk_size)));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(invalid(format!("chunking.min_chunk_size ({}) exceeds chunk_size ({})", self.min_chunk_size, self.chunk_size)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub rrf_k: f64,
    pub weight_dense: f64,
    pub weight_sparse: f64,
    pub over_fetch_depth: usize,
    pub final_n: usize,
    pub preserve_top_dense: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { rrf_k: 60.0, weight_dense: 1.0, weight_sparse: 1.0, over_fetch_depth: 100, final_n: 5, preserve_top_dense: 1 }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            return Err(invalid(format!("retrieval.rrf_k must be > 0, got {}", self.rrf_k)));
        }
        for (name, w) in [("weight_dense", self.weight_dense), ("weight_sparse", self.weight_sparse)] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(invalid(format!("retrieval.{name} must be a non-negative number, got {w}")));
            }
        }
        if self.final_n == 0 {
            return Err(invalid("retrieval.final_n must be > 0".to_string()));
        }
        if self.over_fetch_depth < self.final_n {
            return Err(invalid(format!("retrieval.over_fetch_depth ({}) is smaller than final_n ({})", self.over_fetch_depth, self.final_n)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Instruction,
    #[default]
    CausalCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub strategy: StrategyKind,
    pub max_context_chars: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self { Self { strategy: StrategyKind::default(), max_context_chars: 2000 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub min_answer_chars: usize,
    pub ablation_k_values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    pub qa_samples: usize,
    pub seed: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { min_answer_chars: 10, ablation_k_values: vec![30.0, 60.0, 100.0], sample_size: None, qa_samples: 100, seed: 42 }
    }
}

impl EvaluationSettings {
    pub fn validate(&self) -> Result<()> {
        if let Some(k) = self.ablation_k_values.iter().find(|k| !(k.is_finite() && **k > 0.0)) {
            return Err(invalid(format!("evaluation.ablation_k_values must all be > 0, got {k}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub data_dir: String,
    pub raw_txt_dir: String,
    pub corpus_path: String,
    pub qa_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tantivy_index_dir: Option<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            raw_txt_dir: "data/txt".to_string(),
            corpus_path: "data/corpus.json".to_string(),
            qa_path: "data/qa_dataset.json".to_string(),
            tantivy_index_dir: None,
        }
    }
}

impl DataSettings {
    /// The tantivy index directory is wiped on every build, so it must not
    /// hold (or be) any other data path.
    pub fn validate(&self) -> Result<()> {
        let Some(index_dir) = &self.tantivy_index_dir else { return Ok(()) };
        let index_dir = normalized(&expand_path(index_dir));
        let guarded = [("data_dir", &self.data_dir), ("raw_txt_dir", &self.raw_txt_dir), ("corpus_path", &self.corpus_path), ("qa_path", &self.qa_path)];
        for (name, path) in guarded {
            if normalized(&expand_path(path)).starts_with(&index_dir) {
                return Err(invalid(format!("data.tantivy_index_dir ({}) would wipe data.{name} ({path})", index_dir.display())));
            }
        }
        Ok(())
    }
}

fn normalized(path: &Path) -> PathBuf { path.components().filter(|c| !matches!(c, Component::CurDir)).collect() }

fn invalid(msg: String) -> Error {
    tracing::error!(%msg, "rejecting configuration");
    Error::InvalidConfig(msg)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
