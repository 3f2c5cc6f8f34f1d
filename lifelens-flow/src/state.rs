use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::WorkflowError;
use crate::image::EncodedImage;
use crate::risk::{Diagnosis, RiskTier};

/// Ordered workflow stages.
///
/// Transitions are forward-only except the explicit reset to `Idle`.
/// `Analyzing` is entered and left atomically around a single prediction
/// request; a failed request falls back to `ImageSelected`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum WorkflowStage {
    #[default]
    Idle,
    ImageSelected,
    Analyzing,
    AnalysisComplete,
    ChatActive,
}

/// User-selected source image. Immutable once created; discarded on reset.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub filename: String,
}

/// Outcome of one prediction request.
///
/// The risk tier is deliberately not a field here; snapshots recompute it
/// from (diagnosis, confidence) so the two can never diverge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub diagnosis: Diagnosis,
    /// Percent in [0, 100], validated at the parsing boundary.
    pub confidence: f64,
    pub heatmap: Option<EncodedImage>,
}

/// Supported model families, with the upload hint the panel shows for each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancerType {
    #[default]
    BreastCancer,
    Melanoma,
}

impl CancerType {
    pub fn upload_hint(self) -> &'static str {
        match self {
            CancerType::BreastCancer => "Please upload histopathology slides.",
            CancerType::Melanoma => "Please upload physical skin images.",
        }
    }

    /// Canonical wire value for the `cancerType` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            CancerType::BreastCancer => "breast_cancer",
            CancerType::Melanoma => "melanoma",
        }
    }
}

impl FromStr for CancerType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breast_cancer" => Ok(CancerType::BreastCancer),
            "melanoma" => Ok(CancerType::Melanoma),
            other => Err(WorkflowError::Validation(format!(
                "unknown cancer type {other:?}"
            ))),
        }
    }
}

/// Read-only view of the coordinator state, published to observers after
/// every commit. Cloning is cheap enough for a per-commit broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub stage: WorkflowStage,
    pub ethics_reviewed: bool,
    pub cancer_type: CancerType,
    pub filename: Option<String>,
    pub image: Option<EncodedImage>,
    pub prediction: Option<PredictionResult>,
    pub analysis_pending: bool,
    pub chat_pending: bool,
    pub chat_started: bool,
    pub messages: Vec<ChatMessage>,
    /// Inline, user-visible message from the last failed prediction.
    pub last_error: Option<String>,
}

impl WorkflowSnapshot {
    /// Risk tier derived on demand from the committed prediction.
    pub fn risk_tier(&self) -> Option<RiskTier> {
        self.prediction
            .as_ref()
            .map(|p| RiskTier::classify(p.diagnosis, p.confidence))
    }
}
