//! Core domain types for authored content, simulator inputs and ranks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OptionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(()),
        }
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(()),
        }
    }
}

/// Which authored data set is active.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentVariant {
    #[default]
    Default,
    Tech,
}

impl ContentVariant {
    pub const ALL: [ContentVariant; 2] = [ContentVariant::Default, ContentVariant::Tech];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentVariant::Default => "default",
            ContentVariant::Tech => "tech",
        }
    }
}

impl fmt::Display for ContentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentVariant {
    type Err = ();

    /// Exact match only; stored values are written by us.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ContentVariant::Default),
            "tech" => Ok(ContentVariant::Tech),
            _ => Err(()),
        }
    }
}

/// Partial patch of simulator inputs applied when a step becomes current.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StepSetup {
    pub sim_price: Option<f64>,
    pub strike: Option<f64>,
    pub days_left: Option<u32>,
    #[serde(rename = "type")]
    pub option_type: Option<OptionType>,
    pub side: Option<Side>,
    pub stock_symbol: Option<String>,
    pub premium: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MathLine {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub highlight: bool,
}

/// A glossary term shown with a plain-language metaphor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tooltip {
    pub term: String,
    pub metaphor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize, // index into `options`
}

/// One screen of narrative content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub text: String,
    #[serde(default = "default_action_label")]
    pub action_label: String,
    #[serde(default)]
    pub setup: Option<StepSetup>,
    /// Credited once, the first time the learner advances past this step.
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub math: Vec<MathLine>,
    #[serde(default)]
    pub tooltips: Vec<Tooltip>,
    #[serde(default)]
    pub prediction: Option<Prediction>,
}

fn default_action_label() -> String {
    "Continue".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    pub id: String,
    pub title: String,
    pub description: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub required_pnl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockData {
    pub symbol: &'static str,
    pub name: &'static str,
    pub volatility_multiplier: f64,
}

/// Named (type, side) preset offered next to the payoff chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub option_type: OptionType,
    pub side: Side,
}
