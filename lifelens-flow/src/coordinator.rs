use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::chat::{self, ChatSession};
use crate::client::InferenceApi;
use crate::error::{Result, WorkflowError};
use crate::image::EncodedImage;
use crate::state::{CancerType, PredictionResult, UploadedImage, WorkflowSnapshot, WorkflowStage};

struct Inner {
    stage: WorkflowStage,
    ethics_reviewed: bool,
    cancer_type: CancerType,
    image: Option<UploadedImage>,
    encoded: Option<EncodedImage>,
    prediction: Option<PredictionResult>,
    chat: ChatSession,
    analysis_pending: bool,
    chat_pending: bool,
    chat_queue: VecDeque<String>,
    last_error: Option<String>,
}

impl Inner {
    fn new() -> Self {
        Self {
            stage: WorkflowStage::Idle,
            ethics_reviewed: false,
            cancer_type: CancerType::default(),
            image: None,
            encoded: None,
            prediction: None,
            chat: ChatSession::new(),
            analysis_pending: false,
            chat_pending: false,
            chat_queue: VecDeque::new(),
            last_error: None,
        }
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            stage: self.stage,
            ethics_reviewed: self.ethics_reviewed,
            cancer_type: self.cancer_type,
            filename: self.image.as_ref().map(|i| i.filename.clone()),
            image: self.encoded.clone(),
            prediction: self.prediction.clone(),
            analysis_pending: self.analysis_pending,
            chat_pending: self.chat_pending,
            chat_started: self.chat.started(),
            messages: self.chat.messages().to_vec(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Sole owner of the workflow state.
///
/// Every mutation runs inside `commit`, under the lock, and is published to
/// observers as one complete snapshot; no observer ever sees a half-applied
/// update (a committed diagnosis always comes with a derivable risk tier).
/// The lock is never held across an await; in-flight requests are tracked
/// with pending flags instead, which also gives single-flight submission.
pub struct WorkflowCoordinator {
    api: Arc<dyn InferenceApi>,
    inner: Mutex<Inner>,
    watch_tx: watch::Sender<WorkflowSnapshot>,
}

impl WorkflowCoordinator {
    pub fn new(api: Arc<dyn InferenceApi>) -> Self {
        let inner = Inner::new();
        let (watch_tx, _) = watch::channel(inner.snapshot());
        Self {
            api,
            inner: Mutex::new(inner),
            watch_tx,
        }
    }

    /// Current committed snapshot.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.inner.lock().unwrap().snapshot()
    }

    /// Subscribe to state changes. The receiver always holds the latest
    /// committed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.watch_tx.subscribe()
    }

    fn commit<R>(&self, mutate: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        let out = mutate(&mut inner);
        self.watch_tx.send_replace(inner.snapshot());
        out
    }

    /// Record the user's file selection and encode it canonically.
    ///
    /// Rejected once the analysis has run; the way back is `reset`.
    pub fn select_image(
        &self,
        bytes: Vec<u8>,
        mime: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<()> {
        self.commit(|inner| {
            if inner.stage >= WorkflowStage::Analyzing {
                return Err(WorkflowError::Validation(
                    "image can no longer be changed; reset the workflow first".to_string(),
                ));
            }
            let image = UploadedImage {
                bytes,
                mime: mime.into(),
                filename: filename.into(),
            };
            inner.encoded = Some(EncodedImage::encode(&image.bytes, &image.mime));
            info!(filename = %image.filename, "image selected");
            inner.image = Some(image);
            inner.stage = WorkflowStage::ImageSelected;
            inner.last_error = None;
            Ok(())
        })
    }

    /// Record that the user read the ethics code. Orthogonal to the stage.
    pub fn mark_ethics_reviewed(&self) {
        self.commit(|inner| inner.ethics_reviewed = true);
    }

    /// Commit the model-family choice locally, then notify the service in
    /// the background. A failed notification is logged and dropped, never
    /// surfaced.
    pub fn select_cancer_type(&self, cancer_type: CancerType) {
        self.commit(|inner| inner.cancer_type = cancer_type);
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.set_cancer_type(cancer_type).await {
                warn!("set-cancer-type notification failed: {e}");
            }
        });
    }

    /// Submit the selected image for analysis.
    ///
    /// Single-flight: a second call while one is pending is rejected locally
    /// and never sent. On failure the stage falls back to `ImageSelected`
    /// with an inline error message; retrying is just calling this again.
    pub async fn run_analysis(&self) -> Result<()> {
        let image = self.commit(|inner| {
            if inner.analysis_pending {
                return Err(WorkflowError::Validation(
                    "an analysis is already in flight".to_string(),
                ));
            }
            if inner.stage >= WorkflowStage::AnalysisComplete {
                return Err(WorkflowError::Validation(
                    "analysis already completed; reset to run again".to_string(),
                ));
            }
            // Defensive: the panel disables the trigger without an image.
            let image = inner.image.clone().ok_or_else(|| {
                WorkflowError::Validation("no image selected".to_string())
            })?;
            inner.analysis_pending = true;
            inner.stage = WorkflowStage::Analyzing;
            inner.last_error = None;
            Ok(image)
        })?;

        info!(filename = %image.filename, "submitting image for analysis");
        let outcome = self.api.predict(&image).await;

        self.commit(|inner| {
            inner.analysis_pending = false;
            match outcome {
                Ok(prediction) => {
                    info!(
                        diagnosis = %prediction.diagnosis,
                        confidence = prediction.confidence,
                        "analysis complete"
                    );
                    inner.prediction = Some(prediction);
                    inner.stage = WorkflowStage::AnalysisComplete;
                    Ok(())
                }
                Err(e) => {
                    warn!("analysis failed: {e}");
                    inner.stage = WorkflowStage::ImageSelected;
                    inner.last_error = Some(e.to_string());
                    Err(e)
                }
            }
        })
    }

    /// Send a chat message.
    ///
    /// No-op while the gate is closed or for blank input. The user message
    /// is appended optimistically before the request goes out. Messages sent
    /// while a reply is pending are queued and drained strictly in send
    /// order. The operation itself never fails the caller: a transport error
    /// becomes a synthetic bot message and the session stays renderable.
    pub async fn send_chat(&self, text: &str) {
        let text = text.trim();
        let drains = self.commit(|inner| {
            if !chat::chat_ready(inner.stage) || text.is_empty() {
                return false;
            }
            inner.chat.push_user(text);
            inner.stage = WorkflowStage::ChatActive;
            inner.chat_queue.push_back(text.to_string());
            if inner.chat_pending {
                // The in-flight drain picks this up in order.
                false
            } else {
                inner.chat_pending = true;
                true
            }
        });

        if drains {
            self.drain_chat_queue().await;
        }
    }

    async fn drain_chat_queue(&self) {
        loop {
            let next = self.commit(|inner| match inner.chat_queue.pop_front() {
                Some(message) => Some(message),
                None => {
                    inner.chat_pending = false;
                    None
                }
            });
            let Some(message) = next else { return };

            let reply = match self.api.chat(&message).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("chat request failed: {e}");
                    format!("Failed to reach AI backend: {e}")
                }
            };
            self.commit(|inner| inner.chat.push_bot(reply));
        }
    }

    /// Discard the session and return to `Idle`.
    ///
    /// The ethics flag and the cancer-type choice survive; they describe the
    /// user, not the discarded run. Rejected while a request is in flight so
    /// a late completion cannot land in a fresh session.
    pub fn reset(&self) -> Result<()> {
        self.commit(|inner| {
            if inner.analysis_pending || inner.chat_pending {
                return Err(WorkflowError::Validation(
                    "cannot reset while a request is in flight".to_string(),
                ));
            }
            let ethics_reviewed = inner.ethics_reviewed;
            let cancer_type = inner.cancer_type;
            *inner = Inner::new();
            inner.ethics_reviewed = ethics_reviewed;
            inner.cancer_type = cancer_type;
            Ok(())
        })
    }
}
