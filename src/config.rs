//! Load and validate runtime configuration.

use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

use crate::progression::NavigationPolicy;
use crate::store::FileStore;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageCfg {
    pub dir: Option<String>, // platform data dir when unset
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NavigationCfg {
    pub allow_jump_ahead: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToastCfg {
    pub dismiss_after_sec: u64,
}

impl Default for ToastCfg {
    fn default() -> Self {
        Self { dismiss_after_sec: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PayoffCfg {
    pub range_pct: f64, // window around the strike, 0.25 = ±25%
    pub step: f64,
}

impl Default for PayoffCfg {
    fn default() -> Self {
        Self {
            range_pct: 0.25,
            step: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageCfg,
    pub navigation: NavigationCfg,
    pub toast: ToastCfg,
    pub payoff: PayoffCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.payoff.step.is_nan() || self.payoff.step <= 0.0 {
            anyhow::bail!("payoff.step must be positive, got {}", self.payoff.step);
        }
        if !(0.0..1.0).contains(&self.payoff.range_pct) {
            anyhow::bail!("payoff.range_pct must be in [0, 1), got {}", self.payoff.range_pct);
        }
        Ok(())
    }

    pub fn navigation_policy(&self) -> NavigationPolicy {
        NavigationPolicy {
            allow_jump_ahead: self.navigation.allow_jump_ahead,
        }
    }

    /// `override_dir` (from the environment) wins over the file setting.
    pub fn storage_dir(&self, override_dir: Option<String>) -> anyhow::Result<PathBuf> {
        if let Some(dir) = override_dir.or_else(|| self.storage.dir.clone()) {
            return Ok(PathBuf::from(dir));
        }
        FileStore::default_dir().ok_or_else(|| anyhow::anyhow!("no home directory; set storage.dir"))
    }
}
