//! Worker configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gauntlet_cases::TestParams;
use gauntlet_risk::{RiskConfig, Thresholds};
use gauntlet_session::SimConfig;

use crate::error::{WorkerError, WorkerResult};

/// Control server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9999))
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Case execution section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    /// How long scenarios block for gateway callbacks to land (ms).
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

/// Top-level worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Where SET_TEST_CONFIG persists parameter overrides. Applied back
    /// over `params` on startup, so tuned values survive a restart.
    #[serde(default = "default_overrides_path")]
    pub test_overrides_path: PathBuf,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub session: SimConfig,
    #[serde(default)]
    pub params: TestParams,
    #[serde(default)]
    pub cases: CaseConfig,
}

fn default_overrides_path() -> PathBuf {
    PathBuf::from("config/test_overrides.toml")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            test_overrides_path: default_overrides_path(),
            rpc: RpcConfig::default(),
            risk: RiskConfig::default(),
            thresholds: Thresholds::default(),
            session: SimConfig::default(),
            params: TestParams::default(),
            cases: CaseConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration. Path resolution: CLI flag, then
    /// `GAUNTLET_WORKER_CONFIG`, then `config/worker.toml`; a missing file
    /// falls back to defaults. Persisted test overrides are applied last.
    pub fn load(cli_path: Option<&str>) -> WorkerResult<Self> {
        let path = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var("GAUNTLET_WORKER_CONFIG").ok())
            .unwrap_or_else(|| "config/worker.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
            Self::default()
        };

        if config.test_overrides_path.exists() {
            let overrides = ParamOverrides::load(&config.test_overrides_path)?;
            overrides.apply(&mut config.params);
            tracing::info!(
                path = %config.test_overrides_path.display(),
                "applied persisted test config overrides"
            );
        }
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> WorkerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::Config(format!("failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| WorkerError::Config(format!("failed to parse config: {e}")))
    }
}

/// The runtime-tunable test parameters, as accepted by SET_TEST_CONFIG and
/// persisted between worker restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_buy_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_buy_price: Option<f64>,
}

impl ParamOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_symbol.is_none() && self.safe_buy_price.is_none() && self.deal_buy_price.is_none()
    }

    /// Overlay the set fields onto `params`.
    pub fn apply(&self, params: &mut TestParams) {
        if let Some(symbol) = &self.test_symbol {
            params.test_symbol = symbol.clone();
        }
        if let Some(price) = self.safe_buy_price {
            params.safe_buy_price = price;
        }
        if let Some(price) = self.deal_buy_price {
            params.deal_buy_price = price;
        }
    }

    /// Snapshot of the current effective values, for persistence.
    #[must_use]
    pub fn pin(params: &TestParams) -> Self {
        Self {
            test_symbol: Some(params.test_symbol.clone()),
            safe_buy_price: Some(params.safe_buy_price),
            deal_buy_price: Some(params.deal_buy_price),
        }
    }

    pub fn load(path: &Path) -> WorkerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::Config(format!("failed to read overrides: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| WorkerError::Config(format!("failed to parse overrides: {e}")))
    }

    pub fn save(&self, path: &Path) -> WorkerResult<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| WorkerError::Config(format!("failed to encode overrides: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.rpc.listen_addr, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.cases.settle_ms, 500);
        assert_eq!(config.params.test_symbol, "IF2601");
        assert_eq!(config.thresholds.max_order_count, 5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: WorkerConfig = toml::from_str(
            r#"
            [rpc]
            listen_addr = "127.0.0.1:7777"

            [cases]
            settle_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.rpc.listen_addr, "127.0.0.1:7777".parse().unwrap());
        assert_eq!(config.cases.settle_ms, 50);
        assert_eq!(config.params.safe_buy_price, 4000.0);
        assert_eq!(config.session.symbol, "IF2601");
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = WorkerConfig::default();
        let encoded = toml::to_string(&config).unwrap();
        let decoded: WorkerConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.rpc.listen_addr, config.rpc.listen_addr);
        assert_eq!(decoded.params.deal_buy_price, config.params.deal_buy_price);
    }

    #[test]
    fn test_overrides_save_load_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.toml");

        let overrides = ParamOverrides {
            test_symbol: None,
            safe_buy_price: Some(4100.0),
            deal_buy_price: None,
        };
        overrides.save(&path).unwrap();

        let loaded = ParamOverrides::load(&path).unwrap();
        assert_eq!(loaded.safe_buy_price, Some(4100.0));
        assert_eq!(loaded.test_symbol, None);

        let mut params = TestParams::default();
        loaded.apply(&mut params);
        assert_eq!(params.safe_buy_price, 4100.0);
        assert_eq!(params.test_symbol, "IF2601");
    }

    #[test]
    fn test_empty_overrides_detected() {
        assert!(ParamOverrides::default().is_empty());
        assert!(!ParamOverrides::pin(&TestParams::default()).is_empty());
    }
}
