//! Case decision synthesizer.
//!
//! A case file is built by a six-stage [`Pipeline`]: assessment, repair time,
//! line-item estimate, comparable claims, review signals and the final
//! recommendation. Each stage reads what earlier stages left in the
//! [`CaseContext`] and writes its own result back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::assessment::{AiAssessment, AssessmentEngine};
use crate::comparables::{
    ComparableMatch, ComparableQuery, CostRange, find_comparable_claims, repair_body_type,
    typical_cost_range,
};
use crate::context::{CaseContext, case_keys};
use crate::error::Result;
use crate::line_items::{LineItem, generate_line_items, sum_line_items};
use crate::model::{Claim, Confidence, Severity, TriState};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::repair_time::{RepairTimeEstimate, estimate_repair_time};
use crate::seed::AssessmentSeed;
use crate::signals::{Signal, evaluate_signals_with};
use crate::stage::{NextAction, Stage, StageResult};

/// Below this, a claim cannot be decided without more evidence.
pub const CONFIDENCE_FLOOR: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextStep {
    Tow,
    Repair,
    Inspection,
}

impl fmt::Display for NextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NextStep::Tow => "Tow",
            NextStep::Repair => "Repair",
            NextStep::Inspection => "Inspection",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Authorize,
    Escalate,
    #[serde(rename = "Needs More Photos")]
    NeedsMorePhotos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityBlock {
    pub value: Severity,
    pub confidence: Confidence,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStepBlock {
    pub value: NextStep,
    pub confidence: Confidence,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateBlock {
    pub cost_band: CostRange,
    pub line_items: Vec<LineItem>,
    pub total: u32,
    pub confidence: Confidence,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationBlock {
    pub min_days: u32,
    pub max_days: u32,
    pub confidence: Confidence,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarClaimsBlock {
    pub matches: Vec<ComparableMatch>,
    pub typical_cost_range: Option<CostRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecommendation {
    pub decision: Decision,
    pub confidence: Confidence,
    pub explanation: String,
}

/// The synthesized, explainable output of one run. Never mutated; a new run
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFile {
    pub created_at: DateTime<Utc>,
    pub damage_summary: String,
    pub severity: SeverityBlock,
    pub next_step: NextStepBlock,
    pub estimate: EstimateBlock,
    pub duration: DurationBlock,
    pub similar_claims: SimilarClaimsBlock,
    pub signals: Vec<Signal>,
    pub final_recommendation: FinalRecommendation,
}

pub fn cost_band(severity: Severity) -> CostRange {
    match severity {
        Severity::Low => CostRange { min: 500, max: 1500 },
        Severity::Medium => CostRange { min: 1500, max: 4000 },
        Severity::High => CostRange { min: 4000, max: 9000 },
    }
}

/// Not drivable or High severity goes to a tow; Low goes straight to repair.
pub fn route_next_step(drivable: TriState, severity: Severity) -> NextStep {
    if drivable.is_no() || severity == Severity::High {
        NextStep::Tow
    } else if severity == Severity::Low {
        NextStep::Repair
    } else {
        NextStep::Inspection
    }
}

pub fn next_step_confidence(severity_confidence: Confidence, step: NextStep) -> Confidence {
    let penalty = if step == NextStep::Inspection { 0.06 } else { 0.02 };
    Confidence::new(severity_confidence.value() - penalty)
}

pub fn confidence_floor(values: &[Confidence]) -> Confidence {
    values
        .iter()
        .copied()
        .reduce(Confidence::min)
        .unwrap_or(Confidence::ZERO)
}

/// The final decision table, evaluated top to bottom.
pub fn recommend(
    floor: Confidence,
    signals: &[Signal],
    next_step: NextStep,
    severity: Severity,
) -> FinalRecommendation {
    let floor_value = floor.value();

    if floor_value < CONFIDENCE_FLOOR {
        return FinalRecommendation {
            decision: Decision::NeedsMorePhotos,
            confidence: Confidence::new(floor_value.min(0.58)),
            explanation: format!(
                "Lowest confidence across the case is {floor}, below the {}% floor; \
                 more photos are needed.",
                (CONFIDENCE_FLOOR * 100.0).round()
            ),
        };
    }

    let warnings: Vec<&str> = signals
        .iter()
        .filter(|s| s.is_warning())
        .map(|s| s.title.as_str())
        .collect();
    if !warnings.is_empty() {
        return FinalRecommendation {
            decision: Decision::Escalate,
            confidence: Confidence::new((floor_value - 0.08).max(0.62)),
            explanation: format!("Escalate for review: {}.", warnings.join("; ")),
        };
    }

    if next_step == NextStep::Tow || severity == Severity::High {
        return FinalRecommendation {
            decision: Decision::Escalate,
            confidence: Confidence::new((floor_value - 0.05).max(0.64)),
            explanation: format!(
                "{severity} severity with next step {next_step} needs an adjuster \
                 before authorization."
            ),
        };
    }

    FinalRecommendation {
        decision: Decision::Authorize,
        confidence: Confidence::new(floor_value.max(0.66)),
        explanation: format!("Confidence {floor} with no warnings; safe to authorize {next_step}."),
    }
}

/// Uses the claim's stored assessment, or generates one from the claim seed.
pub struct AssessmentStage {
    engine: AssessmentEngine,
}

#[async_trait]
impl Stage for AssessmentStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let (assessment, note) = match claim.ai_assessment {
            Some(existing) => (existing, "Using stored assessment"),
            None => {
                let seed = AssessmentSeed::from_claim(&claim);
                (self.engine.generate_assessment(&seed).await, "Generated assessment")
            }
        };
        context.set(case_keys::ASSESSMENT, &assessment)?;
        Ok(StageResult::with_note(NextAction::Continue, note))
    }
}

pub struct RepairTimeStage;

#[async_trait]
impl Stage for RepairTimeStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let assessment: AiAssessment = context.require(case_keys::ASSESSMENT)?;
        let body_type = repair_body_type(&claim.vehicle);

        let estimate = estimate_repair_time(
            Some(assessment.severity),
            &assessment.damage_types,
            Some(body_type.as_str()),
            claim.is_total_loss(),
        );
        context.set(case_keys::REPAIR_TIME, &estimate)?;
        Ok(StageResult::new(NextAction::Continue))
    }
}

pub struct EstimateStage;

#[async_trait]
impl Stage for EstimateStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let assessment: AiAssessment = context.require(case_keys::ASSESSMENT)?;

        let items = generate_line_items(&claim.id, assessment.severity, &assessment.damage_types);
        context.set(case_keys::LINE_ITEMS, &items)?;
        Ok(StageResult::new(NextAction::Continue))
    }
}

pub struct ComparablesStage {
    limit: usize,
}

#[async_trait]
impl Stage for ComparablesStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let assessment: AiAssessment = context.require(case_keys::ASSESSMENT)?;

        let query = ComparableQuery {
            make: claim.vehicle.make.clone(),
            model: claim.vehicle.model.clone(),
            severity: assessment.severity,
            damage_areas: assessment.damage_types.clone(),
        };
        let matches = find_comparable_claims(&query, self.limit);
        context.set(case_keys::COMPARABLES, &matches)?;
        Ok(StageResult::new(NextAction::Continue))
    }
}

pub struct SignalsStage;

#[async_trait]
impl Stage for SignalsStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let assessment: AiAssessment = context.require(case_keys::ASSESSMENT)?;

        let signals = evaluate_signals_with(&claim, Some(&assessment));
        context.set(case_keys::SIGNALS, &signals)?;
        Ok(StageResult::new(NextAction::Continue))
    }
}

pub struct RecommendationStage;

#[async_trait]
impl Stage for RecommendationStage {
    async fn run(&self, context: CaseContext) -> Result<StageResult> {
        let claim: Claim = context.require(case_keys::CLAIM)?;
        let assessment: AiAssessment = context.require(case_keys::ASSESSMENT)?;
        let repair: RepairTimeEstimate = context.require(case_keys::REPAIR_TIME)?;
        let line_items: Vec<LineItem> = context.require(case_keys::LINE_ITEMS)?;
        let matches: Vec<ComparableMatch> = context.require(case_keys::COMPARABLES)?;
        let signals: Vec<Signal> = context.require(case_keys::SIGNALS)?;

        let case_file =
            assemble_case_file(&claim, &assessment, repair, line_items, matches, signals);
        let note = format!("{:?}", case_file.final_recommendation.decision);
        context.set(case_keys::CASE_FILE, &case_file)?;
        Ok(StageResult::with_note(NextAction::End, note))
    }
}

fn assemble_case_file(
    claim: &Claim,
    assessment: &AiAssessment,
    repair: RepairTimeEstimate,
    line_items: Vec<LineItem>,
    matches: Vec<ComparableMatch>,
    signals: Vec<Signal>,
) -> CaseFile {
    let severity = assessment.severity;
    let severity_confidence = assessment.confidence;

    let step = route_next_step(claim.drivable, severity);
    let step_confidence = next_step_confidence(severity_confidence, step);
    let step_explanation = match step {
        NextStep::Tow if claim.drivable.is_no() => "Vehicle reported not drivable; arrange a tow.",
        NextStep::Tow => "High severity damage; tow to a partner shop for teardown.",
        NextStep::Repair => "Low severity damage; send straight to repair.",
        NextStep::Inspection => "Moderate damage; schedule an inspection before repair.",
    };

    let duration_confidence = repair.confidence;
    let estimate_confidence =
        Confidence::new((severity_confidence.value() + duration_confidence.value()) / 2.0);
    let total = sum_line_items(&line_items);
    let band = cost_band(severity);

    let floor = confidence_floor(&[
        severity_confidence,
        step_confidence,
        estimate_confidence,
        duration_confidence,
    ]);
    let final_recommendation = recommend(floor, &signals, step, severity);

    let typical = typical_cost_range(&matches);

    CaseFile {
        created_at: Utc::now(),
        damage_summary: format!(
            "{} damage to {} on the {}.",
            severity,
            assessment.damage_types.join(", "),
            claim.vehicle.display_name()
        ),
        severity: SeverityBlock {
            value: severity,
            confidence: severity_confidence,
            explanation: assessment
                .rationale
                .first()
                .cloned()
                .unwrap_or_else(|| format!("Assessed as {severity} severity.")),
        },
        next_step: NextStepBlock {
            value: step,
            confidence: step_confidence,
            explanation: step_explanation.to_string(),
        },
        estimate: EstimateBlock {
            cost_band: band.clone(),
            explanation: format!(
                "{} line items totalling {} against a {} band of {}-{}.",
                line_items.len(),
                total,
                severity,
                band.min,
                band.max
            ),
            line_items,
            total,
            confidence: estimate_confidence,
        },
        duration: DurationBlock {
            min_days: repair.min_days,
            max_days: repair.max_days,
            confidence: duration_confidence,
            explanation: repair.rationale.join(" "),
        },
        similar_claims: SimilarClaimsBlock {
            matches,
            typical_cost_range: typical,
        },
        signals,
        final_recommendation,
    }
}

pub fn build_case_pipeline(engine: AssessmentEngine, comparable_limit: usize) -> Pipeline {
    let assessment_stage = Arc::new(AssessmentStage { engine });
    let repair_stage = Arc::new(RepairTimeStage);
    let estimate_stage = Arc::new(EstimateStage);
    let comparables_stage = Arc::new(ComparablesStage {
        limit: comparable_limit,
    });
    let signals_stage = Arc::new(SignalsStage);
    let recommendation_stage = Arc::new(RecommendationStage);

    let assessment_id = assessment_stage.id().to_string();
    let repair_id = repair_stage.id().to_string();
    let estimate_id = estimate_stage.id().to_string();
    let comparables_id = comparables_stage.id().to_string();
    let signals_id = signals_stage.id().to_string();
    let recommendation_id = recommendation_stage.id().to_string();

    PipelineBuilder::new("case_file")
        .add_stage(assessment_stage)
        .add_stage(repair_stage)
        .add_stage(estimate_stage)
        .add_stage(comparables_stage)
        .add_stage(signals_stage)
        .add_stage(recommendation_stage)
        .add_edge(&assessment_id, &repair_id)
        .add_edge(&repair_id, &estimate_id)
        .add_edge(&estimate_id, &comparables_id)
        .add_edge(&comparables_id, &signals_id)
        .add_edge(&signals_id, &recommendation_id)
        .build()
}

/// Runs the case pipeline for a claim.
#[derive(Clone)]
pub struct CaseSynthesizer {
    pipeline: Arc<Pipeline>,
}

impl CaseSynthesizer {
    pub fn new(engine: AssessmentEngine, comparable_limit: usize) -> Self {
        Self {
            pipeline: Arc::new(build_case_pipeline(engine, comparable_limit)),
        }
    }

    pub async fn synthesize_case_file(&self, claim: &Claim) -> Result<CaseFile> {
        let context = CaseContext::new();
        context.set(case_keys::CLAIM, claim)?;

        let run = self.pipeline.execute(context.clone()).await?;
        let case_file: CaseFile = context.require(case_keys::CASE_FILE)?;

        info!(
            claim_id = %claim.id,
            stages = run.visited.len(),
            decision = ?case_file.final_recommendation.decision,
            confidence = %case_file.final_recommendation.confidence,
            "Case file synthesized"
        );
        Ok(case_file)
    }
}

impl Default for CaseSynthesizer {
    fn default() -> Self {
        Self::new(AssessmentEngine::immediate(), crate::comparables::MIN_MATCHES)
    }
}
