use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    context::CaseContext,
    error::{ClaimError, Result},
    stage::{NextAction, Stage, StageResult},
};

/// Upper bound on stage executions per run, so a `GoTo` loop cannot spin forever.
const MAX_STEPS_PER_STAGE: usize = 4;

/// Edge between stages
#[derive(Clone, Debug)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Trace of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub visited: Vec<String>,
    pub notes: Vec<String>,
}

/// A directed chain of stages sharing one [`CaseContext`]
pub struct Pipeline {
    pub id: String,
    stages: DashMap<String, Arc<dyn Stage>>,
    edges: Vec<Edge>,
    start_stage_id: Option<String>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: DashMap::new(),
            edges: Vec::new(),
            start_stage_id: None,
        }
    }

    /// Find the next stage along the first outgoing edge
    pub fn find_next_stage(&self, current_stage_id: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from == current_stage_id)
            .map(|edge| edge.to.clone())
    }

    async fn execute_single_stage(
        &self,
        stage_id: &str,
        context: CaseContext,
    ) -> Result<StageResult> {
        let stage = self
            .stages
            .get(stage_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ClaimError::StageNotFound(stage_id.to_string()))?;

        let mut result = stage.run(context).await?;
        result.stage_id = stage_id.to_string();
        Ok(result)
    }

    /// Run from the start stage until a stage ends the run or no edge leads on.
    pub async fn execute(&self, context: CaseContext) -> Result<PipelineRun> {
        let mut current = self
            .start_stage_id
            .clone()
            .ok_or_else(|| ClaimError::StageNotFound(format!("{} has no start stage", self.id)))?;

        let step_limit = self.stages.len().max(1) * MAX_STEPS_PER_STAGE;
        let mut run = PipelineRun::default();

        loop {
            if run.visited.len() >= step_limit {
                return Err(ClaimError::ContextError(format!(
                    "pipeline {} exceeded {} steps",
                    self.id, step_limit
                )));
            }

            debug!(pipeline = %self.id, stage_id = %current, "Running stage");
            let result = self.execute_single_stage(&current, context.clone()).await?;
            run.visited.push(result.stage_id.clone());
            if let Some(note) = result.note {
                run.notes.push(note);
            }

            match result.next_action {
                NextAction::Continue => match self.find_next_stage(&result.stage_id) {
                    Some(next) => current = next,
                    None => break,
                },
                NextAction::GoTo(target) => {
                    if !self.stages.contains_key(&target) {
                        return Err(ClaimError::StageNotFound(target));
                    }
                    current = target;
                }
                NextAction::End => break,
            }
        }

        info!(pipeline = %self.id, steps = run.visited.len(), "Pipeline completed");
        Ok(run)
    }
}

/// Builder for creating pipelines
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(id),
        }
    }

    /// Add a stage; the first one added becomes the start stage
    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        let stage_id = stage.id().to_string();
        if self.pipeline.stages.is_empty() {
            self.pipeline.start_stage_id = Some(stage_id.clone());
        }
        self.pipeline.stages.insert(stage_id, stage);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pipeline.edges.push(Edge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CountStage {
        id: String,
        next: NextAction,
    }

    #[async_trait]
    impl Stage for CountStage {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: CaseContext) -> Result<StageResult> {
            let count: u32 = context.get("count").unwrap_or_default();
            context.set("count", count + 1)?;
            Ok(StageResult::with_note(self.next.clone(), format!("{} ran", self.id)))
        }
    }

    fn stage(id: &str, next: NextAction) -> Arc<dyn Stage> {
        Arc::new(CountStage {
            id: id.to_string(),
            next,
        })
    }

    #[tokio::test]
    async fn test_linear_pipeline_runs_every_stage() {
        let pipeline = PipelineBuilder::new("linear")
            .add_stage(stage("a", NextAction::Continue))
            .add_stage(stage("b", NextAction::Continue))
            .add_stage(stage("c", NextAction::Continue))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build();

        let context = CaseContext::new();
        let run = pipeline.execute(context.clone()).await.unwrap();

        assert_eq!(run.visited, vec!["a", "b", "c"]);
        assert_eq!(run.notes.len(), 3);
        assert_eq!(context.get::<u32>("count"), Some(3));
    }

    #[tokio::test]
    async fn test_end_stops_early_and_goto_jumps() {
        let pipeline = PipelineBuilder::new("jump")
            .add_stage(stage("a", NextAction::GoTo("c".to_string())))
            .add_stage(stage("b", NextAction::Continue))
            .add_stage(stage("c", NextAction::End))
            .add_edge("a", "b")
            .add_edge("c", "b")
            .build();

        let run = pipeline.execute(CaseContext::new()).await.unwrap();
        assert_eq!(run.visited, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_missing_goto_target_is_an_error() {
        let pipeline = PipelineBuilder::new("broken")
            .add_stage(stage("a", NextAction::GoTo("nowhere".to_string())))
            .build();

        let err = pipeline.execute(CaseContext::new()).await.unwrap_err();
        assert!(matches!(err, ClaimError::StageNotFound(id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn test_cycles_are_bounded() {
        let pipeline = PipelineBuilder::new("loop")
            .add_stage(stage("a", NextAction::Continue))
            .add_stage(stage("b", NextAction::Continue))
            .add_edge("a", "b")
            .add_edge("b", "a")
            .build();

        let err = pipeline.execute(CaseContext::new()).await.unwrap_err();
        assert!(matches!(err, ClaimError::ContextError(_)));
    }
}
