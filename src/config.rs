use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub frame: FrameConfig,
}

impl Config {
    /// Parse a configuration from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }
}

/// Document store connection and limits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub hosts: Vec<String>,
    pub timeout_secs: u64,
    /// Largest `size` a single search may ask for
    pub max_result_window: usize,
    pub analyzer: AnalyzerConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost:9200".to_string()],
            timeout_secs: 10,
            max_result_window: 10_000,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the largest page a search may request
    pub fn with_max_result_window(mut self, max_result_window: usize) -> Self {
        self.max_result_window = max_result_window;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }
}

/// Analyzer configuration for full-text `match` queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub lowercase: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            min_token_length: 1,
            max_token_length: 255,
        }
    }
}

/// Defaults for search frames
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Keep hits in score order when scanning all results
    pub preserve_order: bool,
    /// Buckets requested by `value_counts`
    pub value_counts_size: usize,
    /// Precision threshold passed to the cardinality aggregation
    pub cardinality_precision: u32,
    /// Rows fetched by `preview`
    pub preview_rows: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            preserve_order: false,
            value_counts_size: 10,
            cardinality_precision: 3000,
            preview_rows: 100,
        }
    }
}

impl FrameConfig {
    pub fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    pub fn with_value_counts_size(mut self, size: usize) -> Self {
        self.value_counts_size = size;
        self
    }

    pub fn with_cardinality_precision(mut self, precision: u32) -> Self {
        self.cardinality_precision = precision;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }
}
