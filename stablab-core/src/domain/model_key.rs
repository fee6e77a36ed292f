use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Model family: what kind of interpretable structure the model exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "DT")]
    DecisionTree,
    #[serde(rename = "LM")]
    LinearModel,
}

impl ModelFamily {
    pub fn code(&self) -> &'static str {
        match self {
            ModelFamily::DecisionTree => "DT",
            ModelFamily::LinearModel => "LM",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "DT" | "DECISION_TREE" | "DECISIONTREE" => Some(ModelFamily::DecisionTree),
            "LM" | "LINEAR_MODEL" | "LINEARMODEL" => Some(ModelFamily::LinearModel),
            _ => None,
        }
    }
}

/// Implementation variant within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    Sklearn,
    LinearRegression,
    Lasso,
    Ridge,
}

impl ModelVariant {
    pub fn code(&self) -> &'static str {
        match self {
            ModelVariant::Sklearn => "sklearn",
            ModelVariant::LinearRegression => "linear_regression",
            ModelVariant::Lasso => "lasso",
            ModelVariant::Ridge => "ridge",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "sklearn" => Some(ModelVariant::Sklearn),
            "linear_regression" | "ols" => Some(ModelVariant::LinearRegression),
            "lasso" => Some(ModelVariant::Lasso),
            "ridge" => Some(ModelVariant::Ridge),
            _ => None,
        }
    }
}

/// Identity of the model under study: `(family, variant)`.
///
/// Parsing goes through an explicit lookup table; user input is never
/// interpreted beyond matching known codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub family: ModelFamily,
    pub variant: ModelVariant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelKeyError {
    #[error("malformed model key '{0}': expected FAMILY:VARIANT, e.g. DT:sklearn or LM:ridge")]
    Malformed(String),
    #[error("unknown model family '{0}' (known: DT, LM)")]
    UnknownFamily(String),
    #[error("unknown model variant '{0}' (known: sklearn, linear_regression, lasso, ridge)")]
    UnknownVariant(String),
}

impl ModelKey {
    pub const fn new(family: ModelFamily, variant: ModelVariant) -> Self {
        Self { family, variant }
    }

    /// File-name friendly form, e.g. `DT-sklearn`.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.family.code(), self.variant.code())
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family.code(), self.variant.code())
    }
}

impl FromStr for ModelKey {
    type Err = ModelKeyError;

    /// Accepts `DT:sklearn`, `LM,ridge`, `LM-lasso`, `LM/ridge` and the tuple
    /// form `('LM', 'ridge')`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .chars()
            .filter(|c| !matches!(c, '\'' | '"' | ' '))
            .collect();

        let mut parts = cleaned.splitn(2, &[':', ',', '-', '/'][..]);
        let (family, variant) = match (parts.next(), parts.next()) {
            (Some(f), Some(v)) if !f.is_empty() && !v.is_empty() => (f, v),
            _ => return Err(ModelKeyError::Malformed(s.to_string())),
        };

        let family = ModelFamily::from_code(family)
            .ok_or_else(|| ModelKeyError::UnknownFamily(family.to_string()))?;
        let variant = ModelVariant::from_code(variant)
            .ok_or_else(|| ModelKeyError::UnknownVariant(variant.to_string()))?;

        Ok(Self { family, variant })
    }
}
