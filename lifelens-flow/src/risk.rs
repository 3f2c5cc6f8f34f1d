use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// The two labels the inference service may return. Anything else is a
/// contract violation and is rejected at the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnosis {
    Benign,
    Malignant,
}

impl fmt::Display for Diagnosis {
    /// Uppercase form, as shown in the report panel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Benign => write!(f, "BENIGN"),
            Diagnosis::Malignant => write!(f, "MALIGNANT"),
        }
    }
}

impl FromStr for Diagnosis {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "benign" => Ok(Diagnosis::Benign),
            "malignant" => Ok(Diagnosis::Malignant),
            other => Err(WorkflowError::Validation(format!(
                "unknown diagnosis label {other:?}"
            ))),
        }
    }
}

/// Coarse severity bucket derived from diagnosis and confidence.
///
/// Never stored alongside a prediction; always recomputed from the pair so
/// the two cannot diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    /// Derive the tier from a parsed diagnosis. Pure and total.
    ///
    /// A low-confidence benign call is treated as high risk: the model is
    /// effectively saying it cannot rule malignancy out.
    pub fn classify(diagnosis: Diagnosis, confidence: f64) -> Self {
        match diagnosis {
            Diagnosis::Malignant if confidence >= 70.0 => RiskTier::High,
            Diagnosis::Malignant if confidence >= 40.0 => RiskTier::Medium,
            Diagnosis::Malignant => RiskTier::Low,
            Diagnosis::Benign if confidence >= 70.0 => RiskTier::Low,
            Diagnosis::Benign if confidence >= 40.0 => RiskTier::Medium,
            Diagnosis::Benign => RiskTier::High,
        }
    }

    /// String-label entry point. Fails on an out-of-domain label instead of
    /// defaulting to a plausible-looking tier.
    pub fn classify_label(label: &str, confidence: f64) -> Result<Self> {
        Ok(Self::classify(label.parse()?, confidence))
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::High => write!(f, "High"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::Low => write!(f, "Low"),
        }
    }
}
