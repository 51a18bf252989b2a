//! Authored course content, stock table and scenario presets.
//!
//! Each content variant is a YAML list of modules compiled into the binary.
//! Variants must share the same shape; only wording and tickers differ.

use thiserror::Error;
use tracing::debug;

use crate::types::{ContentVariant, Module, OptionType, Scenario, Side, StockData, Step};

const DEFAULT_YAML: &str = include_str!("../content/default.yaml");
const TECH_YAML: &str = include_str!("../content/tech.yaml");

/// Volatility used when a step names a ticker we have no data for.
pub const FALLBACK_VOLATILITY: f64 = 1.0;

pub const STOCKS: &[StockData] = &[
    StockData { symbol: "TSLA", name: "Tesla (High Drama)", volatility_multiplier: 2.5 },
    StockData { symbol: "KO", name: "Coke (Sleepy)", volatility_multiplier: 0.8 },
    StockData { symbol: "LULU", name: "Lululemon (Trendy)", volatility_multiplier: 1.4 },
];

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: "lottery-ticket",
        name: "Lottery Ticket",
        description: "Buy a Call. High risk, high reward if it moons.",
        option_type: OptionType::Call,
        side: Side::Buy,
    },
    Scenario {
        id: "insurance-buyer",
        name: "Insurance Buyer",
        description: "Buy a Put. Protect against a market crash.",
        option_type: OptionType::Put,
        side: Side::Buy,
    },
    Scenario {
        id: "insurance-seller",
        name: "Insurance Seller",
        description: "Sell a Put. Collect fees for promising to buy.",
        option_type: OptionType::Put,
        side: Side::Sell,
    },
    Scenario {
        id: "casino-house",
        name: "The Casino",
        description: "Sell a Call. Collect fees, but watch for unlimited risk.",
        option_type: OptionType::Call,
        side: Side::Sell,
    },
];

pub fn stock(symbol: &str) -> Option<&'static StockData> {
    STOCKS.iter().find(|s| s.symbol.eq_ignore_ascii_case(symbol.trim()))
}

pub fn volatility_for(symbol: &str) -> f64 {
    stock(symbol).map_or(FALLBACK_VOLATILITY, |s| s.volatility_multiplier)
}

pub fn scenario(id: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id.eq_ignore_ascii_case(id.trim()))
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content variant `{variant}` is not valid YAML: {source}")]
    Parse {
        variant: ContentVariant,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("content variant `{0}` has no modules")]
    NoModules(ContentVariant),
    #[error("module `{module}` in variant `{variant}` has no steps")]
    EmptyModule { variant: ContentVariant, module: String },
}

/// Immutable module lists for every variant.
#[derive(Debug, Clone)]
pub struct ContentStore {
    default: Vec<Module>,
    tech: Vec<Module>,
}

impl ContentStore {
    /// Parses the content compiled into the binary.
    pub fn builtin() -> Result<Self, ContentError> {
        Ok(Self {
            default: parse_variant(ContentVariant::Default, DEFAULT_YAML)?,
            tech: parse_variant(ContentVariant::Tech, TECH_YAML)?,
        })
    }

    #[cfg(test)]
    pub fn from_modules(default: Vec<Module>, tech: Vec<Module>) -> Result<Self, ContentError> {
        validate(ContentVariant::Default, &default)?;
        validate(ContentVariant::Tech, &tech)?;
        Ok(Self { default, tech })
    }

    pub fn modules(&self, variant: ContentVariant) -> &[Module] {
        match variant {
            ContentVariant::Default => &self.default,
            ContentVariant::Tech => &self.tech,
        }
    }

    pub fn step(&self, variant: ContentVariant, module_idx: usize, step_idx: usize) -> Option<&Step> {
        self.modules(variant).get(module_idx)?.steps.get(step_idx)
    }
}

fn parse_variant(variant: ContentVariant, yaml: &str) -> Result<Vec<Module>, ContentError> {
    let modules: Vec<Module> =
        serde_yaml::from_str(yaml).map_err(|source| ContentError::Parse { variant, source })?;
    validate(variant, &modules)?;
    debug!(
        "Loaded {} modules ({} steps) for variant {}",
        modules.len(),
        modules.iter().map(|m| m.steps.len()).sum::<usize>(),
        variant
    );
    Ok(modules)
}

fn validate(variant: ContentVariant, modules: &[Module]) -> Result<(), ContentError> {
    if modules.is_empty() {
        return Err(ContentError::NoModules(variant));
    }
    if let Some(m) = modules.iter().find(|m| m.steps.is_empty()) {
        return Err(ContentError::EmptyModule {
            variant,
            module: m.id.clone(),
        });
    }
    Ok(())
}
