//! Operator configuration and per-invocation context

use anyhow::{Context, Result};
use guardrail_oracle::OracleConfig;
use guardrail_vault::{AgentId, Limits, TimestampMs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::Store;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "guardrail.toml";

/// Contents of `guardrail.toml`; every field is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Identity commands act as unless `--as` is given
    pub identity: String,
    /// Ledger state file; `~` and environment variables are expanded
    pub state_path: String,
    /// Limits for vaults created with `init`
    pub limits: LimitsSection,
    /// Oracle config for vaults created with `init`
    pub oracle: OracleSection,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            identity: "operator".to_string(),
            state_path: "~/.guardrail/ledger.json".to_string(),
            limits: LimitsSection::default(),
            oracle: OracleSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_drawdown_bps: u64,
    pub daily_volume_limit: u64,
    pub cooldown_ms: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_drawdown_bps: limits.max_drawdown_bps,
            daily_volume_limit: limits.daily_volume_limit,
            cooldown_ms: limits.cooldown_ms,
        }
    }
}

impl From<&LimitsSection> for Limits {
    fn from(s: &LimitsSection) -> Self {
        Limits {
            max_drawdown_bps: s.max_drawdown_bps,
            daily_volume_limit: s.daily_volume_limit,
            cooldown_ms: s.cooldown_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub max_slippage_bps: u64,
    pub max_staleness_ms: u64,
    pub enabled: bool,
}

impl Default for OracleSection {
    fn default() -> Self {
        let oracle = OracleConfig::default();
        Self {
            max_slippage_bps: oracle.max_slippage_bps,
            max_staleness_ms: oracle.max_staleness_ms,
            enabled: oracle.enabled,
        }
    }
}

impl From<&OracleSection> for OracleConfig {
    fn from(s: &OracleSection) -> Self {
        OracleConfig {
            max_slippage_bps: s.max_slippage_bps,
            max_staleness_ms: s.max_staleness_ms,
            enabled: s.enabled,
        }
    }
}

impl GuardrailConfig {
    /// Load the config file
    ///
    /// An explicitly named file must exist. The default file is optional and
    /// its absence means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Expand `~` and `$VARS` in a user-supplied path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand path: {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Everything a command needs: settings, storage, caller identity and clock
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub settings: GuardrailConfig,
    pub store: Store,
    pub identity: AgentId,
    pub now_ms: TimestampMs,
}

impl CliConfig {
    pub fn new(
        config_path: Option<PathBuf>,
        state_path: Option<PathBuf>,
        identity: Option<String>,
        now_ms: Option<TimestampMs>,
    ) -> Result<Self> {
        let config_path = config_path
            .map(|p| expand_path(&p.to_string_lossy()))
            .transpose()?;
        let settings = GuardrailConfig::load(config_path.as_deref())?;

        let state_path = match state_path {
            Some(p) => expand_path(&p.to_string_lossy())?,
            None => expand_path(&settings.state_path)?,
        };

        let identity = AgentId::new(identity.unwrap_or_else(|| settings.identity.clone()));
        let now_ms = match now_ms {
            Some(ms) => ms,
            None => wall_clock_ms()?,
        };

        Ok(Self {
            settings,
            store: Store::new(state_path),
            identity,
            now_ms,
        })
    }

    /// Same context, different caller
    pub fn acting_as(&self, identity: &str) -> Self {
        Self {
            identity: AgentId::new(identity),
            ..self.clone()
        }
    }

    /// Same context, different clock
    pub fn at(&self, now_ms: TimestampMs) -> Self {
        Self { now_ms, ..self.clone() }
    }
}

fn wall_clock_ms() -> Result<TimestampMs> {
    u64::try_from(chrono::Utc::now().timestamp_millis()).context("System clock is before the Unix epoch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_default_config_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(GuardrailConfig::load(Some(&missing)).is_err());
        assert_eq!(GuardrailConfig::default().limits.cooldown_ms, 60_000);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardrail.toml");
        fs::write(
            &path,
            "identity = \"alice\"\n\n[limits]\ncooldown_ms = 5000\n\n[oracle]\nenabled = false\n",
        )
        .unwrap();

        let config = GuardrailConfig::load(Some(&path)).unwrap();
        assert_eq!(config.identity, "alice");
        assert_eq!(config.limits.cooldown_ms, 5_000);
        assert_eq!(config.limits.max_drawdown_bps, 1_000);
        assert!(!config.oracle.enabled);
        assert_eq!(config.oracle.max_staleness_ms, 30_000);
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardrail.toml");
        fs::write(&path, "identity = [").unwrap();
        let err = GuardrailConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let ctx = CliConfig::new(None, Some(state.clone()), Some("bob".into()), Some(42)).unwrap();
        assert_eq!(ctx.identity.as_str(), "bob");
        assert_eq!(ctx.now_ms, 42);
        assert_eq!(ctx.store.state_path(), state.as_path());
    }

    #[test]
    fn test_path_expansion() {
        assert_eq!(expand_path("/tmp/ledger.json").unwrap(), PathBuf::from("/tmp/ledger.json"));
        assert!(expand_path("$GUARDRAIL_TEST_SURELY_UNSET/ledger.json").is_err());
    }
}
