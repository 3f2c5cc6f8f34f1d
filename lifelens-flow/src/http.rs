use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::debug;

use crate::client::{
    CANCER_TYPE_PATH, CHAT_PATH, DEFAULT_BASE_URL, InferenceApi, PREDICT_PATH, parse_chat_reply,
    parse_prediction,
};
use crate::error::{Result, WorkflowError};
use crate::state::{CancerType, PredictionResult, UploadedImage};

/// `InferenceApi` over HTTP, speaking the canonical contract.
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl InferenceApi for HttpClient {
    async fn predict(&self, image: &UploadedImage) -> Result<PredictionResult> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mime)
            .map_err(|e| {
                WorkflowError::Validation(format!("invalid mime type {:?}: {e}", image.mime))
            })?;
        let form = Form::new().part("file", part);

        debug!(filename = %image.filename, "POST {}", PREDICT_PATH);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, PREDICT_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkflowError::Network(e.to_string()))?;
        let body = read_success_body(response).await?;
        parse_prediction(&body)
    }

    async fn chat(&self, message: &str) -> Result<String> {
        debug!("POST {}", CHAT_PATH);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, CHAT_PATH))
            .json(&json!({ "message": message }))
            .send()
            .await
            .map_err(|e| WorkflowError::Network(e.to_string()))?;
        let body = read_success_body(response).await?;
        parse_chat_reply(&body)
    }

    async fn set_cancer_type(&self, cancer_type: CancerType) -> Result<()> {
        debug!(cancer_type = cancer_type.wire_name(), "POST {}", CANCER_TYPE_PATH);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, CANCER_TYPE_PATH))
            .json(&json!({ "cancerType": cancer_type.wire_name() }))
            .send()
            .await
            .map_err(|e| WorkflowError::Network(e.to_string()))?;
        read_success_body(response).await?;
        Ok(())
    }
}

/// Map a non-success status to `Network` and read the body.
async fn read_success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(WorkflowError::Network(format!(
            "inference service returned {status}"
        )));
    }
    response
        .text()
        .await
        .map_err(|e| WorkflowError::Network(e.to_string()))
}
