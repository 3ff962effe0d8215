#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Config reader (spec.md §6.3): gateway-file layout parameters and charge keywords,
//! read once per run from a pluggable configuration store.

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

pub type GatewayName = String;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("gateway config not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayConfigType {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Xlsx,
    Xls,
    Csv,
}

impl FileFormat {
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }
}

/// Column layout and parsing parameters for one gateway side. The mandatory fields for
/// the core are `charge_keywords` and the parsing parameters consumed by the
/// normalizer (spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFileConfig {
    pub name: GatewayName,
    pub config_type: GatewayConfigType,
    pub filename_prefix: String,
    pub expected_filetypes: Vec<FileFormat>,
    pub header_row_config: HashMap<FileFormat, usize>,
    pub end_of_data_signal: Option<String>,
    pub date_format: String,
    pub charge_keywords: Vec<String>,
    pub required_columns: Vec<String>,
    pub date_column: String,
    pub reference_column: String,
    pub narrative_column: String,
    pub debit_column: String,
    pub credit_column: String,
    pub numeric_columns: Vec<String>,
    pub string_columns: Vec<String>,
    /// Reference column fallback: when `reference_column` is absent in the raw data,
    /// copy from this column instead (spec.md §4.3 step 7).
    pub reference_fallback_column: Option<String>,
    /// Equity-style leading spacer columns to drop (spec.md §4.3 step 2 / SPEC_FULL.md C.4).
    pub leading_spacer_columns: usize,
    pub top_up_marker: Option<String>,
}

impl GatewayFileConfig {
    #[must_use]
    pub fn header_rows_to_skip(&self, format: FileFormat) -> usize {
        self.header_row_config.get(&format).copied().unwrap_or(0)
    }
}

#[async_trait]
pub trait GatewayConfigStore: Send + Sync {
    async fn put_config(&self, config: GatewayFileConfig) -> ConfigResult<()>;
    async fn get_config(
        &self,
        name: &str,
        config_type: GatewayConfigType,
    ) -> ConfigResult<GatewayFileConfig>;
    async fn list_configs(&self) -> ConfigResult<Vec<GatewayFileConfig>>;
}

#[derive(Default)]
pub struct InMemoryGatewayConfigStore {
    configs: RwLock<HashMap<(GatewayName, GatewayConfigType), GatewayFileConfig>>,
}

impl InMemoryGatewayConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with the three example gateway families named in spec.md §3.1
    /// (`equity`, `kcb`, `mpesa`), both sides. The core itself is gateway-name-agnostic;
    /// these defaults exist only so callers have realistic fixtures out of the box.
    pub async fn seed_defaults(&self) {
        for name in ["equity", "kcb", "mpesa"] {
            for config_type in [GatewayConfigType::External, GatewayConfigType::Internal] {
                let _ = self
                    .put_config(default_gateway_config(name, config_type))
                    .await;
            }
        }
    }
}

#[async_trait]
impl GatewayConfigStore for InMemoryGatewayConfigStore {
    async fn put_config(&self, config: GatewayFileConfig) -> ConfigResult<()> {
        let mut guard = self.configs.write().await;
        guard.insert((config.name.clone(), config.config_type), config);
        Ok(())
    }

    async fn get_config(
        &self,
        name: &str,
        config_type: GatewayConfigType,
    ) -> ConfigResult<GatewayFileConfig> {
        let guard = self.configs.read().await;
        guard
            .get(&(name.to_string(), config_type))
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(format!("{name} ({config_type:?})")))
    }

    async fn list_configs(&self) -> ConfigResult<Vec<GatewayFileConfig>> {
        let guard = self.configs.read().await;
        Ok(guard.values().cloned().collect())
    }
}

#[cfg(feature = "postgres-store")]
#[derive(Clone)]
pub struct PostgresGatewayConfigStore {
    connection_string: String,
}

#[cfg(feature = "postgres-store")]
impl PostgresGatewayConfigStore {
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }
}

#[cfg(feature = "postgres-store")]
#[async_trait]
impl GatewayConfigStore for PostgresGatewayConfigStore {
    async fn put_config(&self, config: GatewayFileConfig) -> ConfigResult<()> {
        let _ = (&self.connection_string, config);
        Err(ConfigError::Storage(
            "postgres gateway config store not yet implemented".into(),
        ))
    }

    async fn get_config(
        &self,
        name: &str,
        config_type: GatewayConfigType,
    ) -> ConfigResult<GatewayFileConfig> {
        let _ = (&self.connection_string, name, config_type);
        Err(ConfigError::Storage(
            "postgres gateway config store not yet implemented".into(),
        ))
    }

    async fn list_configs(&self) -> ConfigResult<Vec<GatewayFileConfig>> {
        let _ = &self.connection_string;
        Err(ConfigError::Storage(
            "postgres gateway config store not yet implemented".into(),
        ))
    }
}

/// Charge keywords come from the union of the external and internal gateway configs
/// (spec.md §4.4 "Charge detection").
#[must_use]
pub fn union_charge_keywords(external: &GatewayFileConfig, internal: &GatewayFileConfig) -> HashSet<String> {
    external
        .charge_keywords
        .iter()
        .chain(internal.charge_keywords.iter())
        .map(|keyword| keyword.to_ascii_lowercase())
        .collect()
}

fn default_gateway_config(name: &str, config_type: GatewayConfigType) -> GatewayFileConfig {
    let filename_prefix = match config_type {
        GatewayConfigType::External => name.to_string(),
        GatewayConfigType::Internal => format!("workpay_{name}"),
    };
    let mut header_row_config = HashMap::new();
    header_row_config.insert(FileFormat::Xlsx, 0);
    header_row_config.insert(FileFormat::Xls, 0);
    header_row_config.insert(FileFormat::Csv, 0);

    GatewayFileConfig {
        name: name.to_string(),
        config_type,
        filename_prefix,
        expected_filetypes: vec![FileFormat::Xlsx, FileFormat::Xls, FileFormat::Csv],
        header_row_config,
        end_of_data_signal: Some("----- End of Statement -----".to_string()),
        date_format: "%d-%m-%Y".to_string(),
        charge_keywords: default_charge_keywords(name, config_type),
        required_columns: vec![
            "Date".to_string(),
            "Reference".to_string(),
            "Details".to_string(),
            "Debit".to_string(),
            "Credit".to_string(),
        ],
        date_column: "Date".to_string(),
        reference_column: "Reference".to_string(),
        narrative_column: "Details".to_string(),
        debit_column: "Debit".to_string(),
        credit_column: "Credit".to_string(),
        numeric_columns: vec!["Debit".to_string(), "Credit".to_string()],
        string_columns: vec!["Reference".to_string(), "Details".to_string()],
        reference_fallback_column: Some("Details".to_string()),
        leading_spacer_columns: if name == "equity" { 2 } else { 0 },
        top_up_marker: Some("TOP UP".to_string()),
    }
}

fn default_charge_keywords(name: &str, config_type: GatewayConfigType) -> Vec<String> {
    if config_type == GatewayConfigType::Internal {
        return Vec::new();
    }
    match name {
        "equity" => vec!["jenga charge".to_string(), "ledger fee".to_string()],
        "kcb" => vec!["excise duty".to_string(), "transaction charge".to_string()],
        "mpesa" => vec!["m-pesa charge".to_string(), "transaction cost".to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn seeded_store_round_trips_equity_external_config() {
        let store = InMemoryGatewayConfigStore::new();
        store.seed_defaults().await;
        let config = store
            .get_config("equity", GatewayConfigType::External)
            .await
            .expect("equity external config exists");
        assert_eq!(config.filename_prefix, "equity");
        assert_eq!(config.leading_spacer_columns, 2);
    }

    #[tokio::test]
    async fn internal_config_uses_workpay_prefix() {
        let store = InMemoryGatewayConfigStore::new();
        store.seed_defaults().await;
        let config = store
            .get_config("equity", GatewayConfigType::Internal)
            .await
            .expect("equity internal config exists");
        assert_eq!(config.filename_prefix, "workpay_equity");
    }

    #[tokio::test]
    async fn missing_config_is_not_found() {
        let store = InMemoryGatewayConfigStore::new();
        let result = store.get_config("unknown", GatewayConfigType::External).await;
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn charge_keywords_union_is_lowercased_and_deduplicated() {
        let external = default_gateway_config("equity", GatewayConfigType::External);
        let internal = default_gateway_config("equity", GatewayConfigType::Internal);
        let union = union_charge_keywords(&external, &internal);
        assert!(union.contains("jenga charge"));
        assert!(union.contains("ledger fee"));
    }

    #[test]
    fn file_format_detected_case_insensitively() {
        assert_eq!(FileFormat::from_extension("XLSX"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_extension("Csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("doc"), None);
    }
}
