use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application configuration: where the ERP exports live and how wide the
/// ingestion pool may go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of monthly sales exports (銷貨單毛利分析表_*.xlsx).
    pub sales_dir: PathBuf,
    /// Directory of inventory snapshots; the newest file wins.
    pub inventory_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Cap on concurrent file loads.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            max_workers: default_max_workers(),
        }
    }
}

fn default_max_workers() -> usize {
    8
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Directory overrides from the environment (loaded from `.env` by the
    /// binary before this runs).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SALES_DATA_DIR") {
            self.data.sales_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("INVENTORY_DATA_DIR") {
            self.data.inventory_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PIPELINE_OUTPUT_DIR") {
            self.data.output_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let toml_str = r#"
            [data]
            sales_dir = "sales data"
            inventory_dir = "bc products"
            output_dir = "out"

            [ingest]
            max_workers = 4
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data.sales_dir, PathBuf::from("sales data"));
        assert_eq!(config.ingest.max_workers, 4);
    }

    #[test]
    fn test_defaults_apply() {
        let toml_str = r#"
            [data]
            sales_dir = "sales data"
            inventory_dir = "bc products"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data.output_dir, PathBuf::from("output"));
        assert_eq!(config.ingest.max_workers, 8);
    }
}
