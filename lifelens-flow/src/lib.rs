//! Client-side workflow core for the LifeLens diagnostic assistant.
//!
//! The user selects a diagnostic image, submits it to a remote inference
//! service, reads the classified risk result and then discusses it with the
//! assistant. [`WorkflowCoordinator`] owns the canonical state and is the
//! only mutation point; presentation layers subscribe to snapshots and stay
//! passive.

pub mod chat;
pub mod client;
pub mod coordinator;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod image;
pub mod progress;
pub mod risk;
pub mod state;

// Re-export commonly used types
pub use chat::{ChatMessage, ChatSession, GREETING, Sender, chat_ready};
pub use client::{DEFAULT_BASE_URL, InferenceApi};
pub use coordinator::WorkflowCoordinator;
pub use error::{Result, WorkflowError};
#[cfg(feature = "http")]
pub use http::HttpClient;
pub use image::{EncodedImage, normalize};
pub use progress::{MILESTONE_COUNT, Milestone, progress};
pub use risk::{Diagnosis, RiskTier};
pub use state::{CancerType, PredictionResult, UploadedImage, WorkflowSnapshot, WorkflowStage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    /// Scripted transport: hands out queued responses in order and fails
    /// the test on an unexpected request. An optional gate holds every
    /// request until the test releases a permit for it.
    #[derive(Default)]
    struct FakeApi {
        predictions: Mutex<VecDeque<Result<PredictionResult>>>,
        replies: Mutex<VecDeque<Result<String>>>,
        gate: Option<Semaphore>,
    }

    impl FakeApi {
        fn with_prediction(result: Result<PredictionResult>) -> Self {
            let api = Self::default();
            api.predictions.lock().unwrap().push_back(result);
            api
        }

        fn push_reply(&self, reply: Result<String>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn gated(mut self) -> Self {
            self.gate = Some(Semaphore::new(0));
            self
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        async fn pass_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
        }
    }

    #[async_trait]
    impl InferenceApi for FakeApi {
        async fn predict(&self, _image: &UploadedImage) -> Result<PredictionResult> {
            self.pass_gate().await;
            self.predictions
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected predict call")
        }

        async fn chat(&self, _message: &str) -> Result<String> {
            self.pass_gate().await;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected chat call")
        }

        async fn set_cancer_type(&self, _cancer_type: CancerType) -> Result<()> {
            Ok(())
        }
    }

    fn malignant_85() -> PredictionResult {
        PredictionResult {
            diagnosis: Diagnosis::Malignant,
            confidence: 85.0,
            heatmap: None,
        }
    }

    fn select_sample_image(coordinator: &WorkflowCoordinator) {
        coordinator
            .select_image(vec![1, 2, 3], "image/png", "scan.png")
            .unwrap();
    }

    #[tokio::test]
    async fn malignant_prediction_completes_the_workflow() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        let coordinator = WorkflowCoordinator::new(api);

        assert_eq!(coordinator.snapshot().stage, WorkflowStage::Idle);

        select_sample_image(&coordinator);
        assert_eq!(coordinator.snapshot().stage, WorkflowStage::ImageSelected);

        coordinator.run_analysis().await.unwrap();

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::AnalysisComplete);
        assert_eq!(snapshot.risk_tier(), Some(RiskTier::High));
        let prediction = snapshot.prediction.unwrap();
        assert_eq!(prediction.diagnosis.to_string(), "MALIGNANT");
        assert!(!snapshot.analysis_pending);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn low_confidence_benign_is_high_risk() {
        let api = Arc::new(FakeApi::with_prediction(Ok(PredictionResult {
            diagnosis: Diagnosis::Benign,
            confidence: 30.0,
            heatmap: None,
        })));
        let coordinator = WorkflowCoordinator::new(api);

        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();

        assert_eq!(coordinator.snapshot().risk_tier(), Some(RiskTier::High));
    }

    #[tokio::test]
    async fn failed_prediction_leaves_state_retryable() {
        let api = Arc::new(FakeApi::with_prediction(Err(WorkflowError::Network(
            "connection refused".to_string(),
        ))));
        let coordinator = WorkflowCoordinator::new(api.clone());

        select_sample_image(&coordinator);
        let err = coordinator.run_analysis().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Network(_)));

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::ImageSelected);
        assert!(!snapshot.analysis_pending);
        assert!(snapshot.last_error.as_ref().unwrap().contains("connection refused"));
        assert_eq!(snapshot.prediction, None);
        // Session and report untouched.
        assert_eq!(snapshot.messages, vec![ChatMessage::bot(GREETING)]);
        assert_eq!(snapshot.risk_tier(), None);

        // Retry is just resubmitting.
        api.predictions
            .lock()
            .unwrap()
            .push_back(Ok(malignant_85()));
        coordinator.run_analysis().await.unwrap();
        assert_eq!(coordinator.snapshot().stage, WorkflowStage::AnalysisComplete);
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected_locally() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())).gated());
        let coordinator = Arc::new(WorkflowCoordinator::new(api.clone()));

        select_sample_image(&coordinator);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_analysis().await })
        };
        while !coordinator.snapshot().analysis_pending {
            tokio::task::yield_now().await;
        }

        let err = coordinator.run_analysis().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(coordinator.snapshot().stage, WorkflowStage::Analyzing);

        api.release();
        first.await.unwrap().unwrap();
        assert_eq!(coordinator.snapshot().stage, WorkflowStage::AnalysisComplete);
    }

    #[tokio::test]
    async fn chat_is_a_no_op_before_analysis_completes() {
        let api = Arc::new(FakeApi::default());
        let coordinator = WorkflowCoordinator::new(api);

        select_sample_image(&coordinator);
        coordinator.send_chat("hello").await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::ImageSelected);
        assert!(!snapshot.chat_started);
        assert_eq!(snapshot.messages, vec![ChatMessage::bot(GREETING)]);
    }

    #[tokio::test]
    async fn blank_chat_input_is_ignored() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        let coordinator = WorkflowCoordinator::new(api);

        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();
        coordinator.send_chat("   ").await;

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.chat_started);
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test]
    async fn chat_appends_user_then_bot_and_activates_the_stage() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        api.push_reply(Ok("see a doctor soon".to_string()));
        let coordinator = WorkflowCoordinator::new(api);

        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();
        coordinator.send_chat("what should I do?").await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::ChatActive);
        assert!(snapshot.chat_started);
        assert_eq!(
            snapshot.messages,
            vec![
                ChatMessage::bot(GREETING),
                ChatMessage::user("what should I do?"),
                ChatMessage::bot("see a doctor soon"),
            ]
        );
    }

    #[tokio::test]
    async fn chat_failure_recovers_with_a_synthetic_bot_message() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        api.push_reply(Err(WorkflowError::Network("timed out".to_string())));
        let coordinator = WorkflowCoordinator::new(api);

        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();
        coordinator.send_chat("hello?").await;

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.chat_pending);
        let last = snapshot.messages.last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert!(last.text.contains("Failed to reach AI backend"));
    }

    #[tokio::test]
    async fn concurrent_chat_sends_are_queued_in_order() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())).gated());
        api.push_reply(Ok("first reply".to_string()));
        api.push_reply(Ok("second reply".to_string()));
        let coordinator = Arc::new(WorkflowCoordinator::new(api.clone()));

        select_sample_image(&coordinator);
        let analysis = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_analysis().await })
        };
        while !coordinator.snapshot().analysis_pending {
            tokio::task::yield_now().await;
        }
        api.release();
        analysis.await.unwrap().unwrap();

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.send_chat("first").await })
        };
        while !coordinator.snapshot().chat_pending {
            tokio::task::yield_now().await;
        }
        // Second send while the first reply is pending: queued, not dropped.
        coordinator.send_chat("second").await;
        assert_eq!(
            coordinator
                .snapshot()
                .messages
                .iter()
                .filter(|m| m.sender == Sender::User)
                .count(),
            2
        );

        api.release();
        api.release();
        first.await.unwrap();
        while coordinator.snapshot().chat_pending {
            tokio::task::yield_now().await;
        }

        let texts: Vec<String> = coordinator
            .snapshot()
            .messages
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(
            texts,
            vec![
                GREETING.to_string(),
                "first".to_string(),
                "second".to_string(),
                "first reply".to_string(),
                "second reply".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn reset_returns_to_idle_but_keeps_user_facts() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        api.push_reply(Ok("ok".to_string()));
        let coordinator = WorkflowCoordinator::new(api);

        coordinator.mark_ethics_reviewed();
        coordinator.select_cancer_type(CancerType::Melanoma);
        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();
        coordinator.send_chat("hi").await;

        coordinator.reset().unwrap();

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::Idle);
        assert_eq!(snapshot.prediction, None);
        assert_eq!(snapshot.filename, None);
        assert_eq!(snapshot.image, None);
        assert_eq!(snapshot.messages, vec![ChatMessage::bot(GREETING)]);
        assert!(!snapshot.chat_started);
        assert!(snapshot.ethics_reviewed);
        assert_eq!(snapshot.cancer_type, CancerType::Melanoma);
    }

    #[tokio::test]
    async fn run_analysis_without_an_image_is_a_validation_error() {
        let api = Arc::new(FakeApi::default());
        let coordinator = WorkflowCoordinator::new(api);

        let err = coordinator.run_analysis().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(coordinator.snapshot().stage, WorkflowStage::Idle);
    }

    #[tokio::test]
    async fn subscribers_observe_committed_transitions() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        let coordinator = WorkflowCoordinator::new(api);
        let mut rx = coordinator.subscribe();

        assert_eq!(rx.borrow().stage, WorkflowStage::Idle);

        select_sample_image(&coordinator);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().stage, WorkflowStage::ImageSelected);

        coordinator.run_analysis().await.unwrap();
        let latest = rx.borrow_and_update();
        assert_eq!(latest.stage, WorkflowStage::AnalysisComplete);
        // Diagnosis and derived tier arrive in the same commit.
        assert!(latest.prediction.is_some());
        assert_eq!(latest.risk_tier(), Some(RiskTier::High));
    }

    #[tokio::test]
    async fn progress_tracks_the_live_snapshot() {
        let api = Arc::new(FakeApi::with_prediction(Ok(malignant_85())));
        let coordinator = WorkflowCoordinator::new(api);

        let steps = progress(&coordinator.snapshot());
        assert!(steps.iter().all(|m| !m.done));

        select_sample_image(&coordinator);
        coordinator.run_analysis().await.unwrap();
        coordinator.mark_ethics_reviewed();

        let steps = progress(&coordinator.snapshot());
        assert!(steps[0].done);
        assert!(steps[1].done);
        assert!(!steps[2].done);
        assert!(steps[3].done);
        assert!(!steps[4].done);
    }
}
