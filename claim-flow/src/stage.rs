use async_trait::async_trait;

use crate::{context::CaseContext, error::Result};

/// What the pipeline should do after a stage completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Run the next stage along the outgoing edge
    Continue,
    /// Jump to a specific stage by ID
    GoTo(String),
    /// Stop; the context holds the result
    End,
}

#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_id: String,
    pub next_action: NextAction,
    pub note: Option<String>,
}

impl StageResult {
    pub fn new(next_action: NextAction) -> Self {
        Self {
            stage_id: String::new(),
            next_action,
            note: None,
        }
    }

    pub fn with_note(next_action: NextAction, note: impl Into<String>) -> Self {
        Self {
            stage_id: String::new(),
            next_action,
            note: Some(note.into()),
        }
    }
}

/// One step of case-file synthesis
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier for this stage
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, context: CaseContext) -> Result<StageResult>;
}
