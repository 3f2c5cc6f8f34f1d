use crate::state::{WorkflowSnapshot, WorkflowStage};

pub const MILESTONE_COUNT: usize = 5;

/// One entry of the fixed progress checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub label: &'static str,
    pub done: bool,
}

/// Derive the five-step checklist from a snapshot.
///
/// Same labels in the same order for every reachable state. The report
/// download step is reserved for a future capability and is never done.
pub fn progress(snapshot: &WorkflowSnapshot) -> [Milestone; MILESTONE_COUNT] {
    [
        Milestone {
            label: "Upload image and specify cancer type",
            done: snapshot.stage >= WorkflowStage::ImageSelected,
        },
        Milestone {
            label: "Run AI analysis model",
            done: snapshot.stage >= WorkflowStage::AnalysisComplete,
        },
        Milestone {
            label: "Discuss results with LifeLens",
            done: snapshot.chat_started,
        },
        Milestone {
            label: "Review AI ethics code",
            done: snapshot.ethics_reviewed,
        },
        Milestone {
            label: "Download demo report",
            done: false,
        },
    ]
}
