use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, WorkflowError};
use crate::image;
use crate::state::{CancerType, PredictionResult, UploadedImage};

/// Canonical inference-service contract.
///
/// Historical deployments disagreed on the port, the heatmap field name and
/// the cancer-type casing; this client speaks exactly one version and treats
/// anything else as a contract mismatch rather than guessing.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const PREDICT_PATH: &str = "/predict";
pub const CHAT_PATH: &str = "/chat";
pub const CANCER_TYPE_PATH: &str = "/set-cancer-type";

/// Transport seam between the coordinator and the inference service.
///
/// Implementations perform the request and the response validation; the
/// coordinator only ever sees domain types or `WorkflowError`.
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// Submit the selected image for classification.
    async fn predict(&self, image: &UploadedImage) -> Result<PredictionResult>;

    /// Ask the assistant a follow-up question, returning its reply.
    async fn chat(&self, message: &str) -> Result<String>;

    /// Tell the service which model family the user selected. The
    /// coordinator treats this as fire-and-forget; errors surface here only
    /// so the caller can log them.
    async fn set_cancer_type(&self, cancer_type: CancerType) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    diagnosis: String,
    certainty_percent: f64,
    #[serde(default)]
    gradcam_overlay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
}

/// Parse and validate a `/predict` body.
///
/// Missing `diagnosis` or `certainty_percent` is a malformed response; an
/// out-of-domain diagnosis label is a validation failure; a missing heatmap
/// field is simply no heatmap.
pub fn parse_prediction(body: &str) -> Result<PredictionResult> {
    let raw: PredictResponse = serde_json::from_str(body)
        .map_err(|e| WorkflowError::MalformedResponse(format!("predict response: {e}")))?;

    if !(0.0..=100.0).contains(&raw.certainty_percent) {
        return Err(WorkflowError::MalformedResponse(format!(
            "certainty_percent out of range: {}",
            raw.certainty_percent
        )));
    }

    Ok(PredictionResult {
        diagnosis: raw.diagnosis.parse()?,
        confidence: raw.certainty_percent,
        heatmap: image::normalize(raw.gradcam_overlay.as_deref()),
    })
}

/// Parse a `/chat` body into the bot reply.
pub fn parse_chat_reply(body: &str) -> Result<String> {
    let raw: ChatResponse = serde_json::from_str(body)
        .map_err(|e| WorkflowError::MalformedResponse(format!("chat response: {e}")))?;
    Ok(raw.reply)
}
