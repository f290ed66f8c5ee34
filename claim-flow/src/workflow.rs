//! Agent override tracking and the claim status lifecycle.
//!
//! Every action here validates first and mutates second: a rejected action
//! returns a [`GuardrailError`] and leaves the claim exactly as it was. Every
//! accepted action appends one timeline event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

use crate::assessment::AiAssessment;
use crate::error::GuardrailError;
use crate::line_items::{LineItem, sum_line_items};
use crate::model::{Claim, ClaimStatus, EventKind, Photo, SeniorApproval, Severity};
use crate::signals::LOW_CONFIDENCE_THRESHOLD;
use crate::synthesis::{CaseFile, NextStep};

/// Largest allowed relative gap between the final estimate and its line items.
pub const ESTIMATE_DIVERGENCE_LIMIT: f64 = 0.10;

type Outcome = std::result::Result<(), GuardrailError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideField {
    Severity,
    NextStep,
    Estimate,
}

impl fmt::Display for OverrideField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverrideField::Severity => "severity",
            OverrideField::NextStep => "next step",
            OverrideField::Estimate => "estimate",
        };
        f.write_str(label)
    }
}

/// What the agent finalised, plus a reason for every field they overrode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub severity: Severity,
    pub next_step: NextStep,
    pub estimate_total: u32,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub override_reasons: BTreeMap<OverrideField, String>,
}

impl AgentDecision {
    /// Starts from the case file's suggestions, so nothing is overridden yet.
    pub fn accept_suggestion(case_file: &CaseFile) -> Self {
        Self {
            severity: case_file.severity.value,
            next_step: case_file.next_step.value,
            estimate_total: case_file.estimate.total,
            line_items: case_file.estimate.line_items.clone(),
            override_reasons: BTreeMap::new(),
        }
    }

    pub fn with_reason(mut self, field: OverrideField, reason: impl Into<String>) -> Self {
        self.override_reasons.insert(field, reason.into());
        self
    }

    fn has_reason(&self, field: OverrideField) -> bool {
        self.override_reasons
            .get(&field)
            .is_some_and(|reason| !reason.trim().is_empty())
    }
}

fn diverges(estimate_total: u32, line_item_total: u32) -> bool {
    if line_item_total == 0 {
        return estimate_total != 0;
    }
    let gap = (f64::from(estimate_total) - f64::from(line_item_total)).abs();
    gap / f64::from(line_item_total) > ESTIMATE_DIVERGENCE_LIMIT
}

/// Fields where the agent departs from the AI suggestion.
///
/// Without a case file only the line-item divergence check applies.
pub fn detect_overrides(
    decision: &AgentDecision,
    suggestion: Option<&CaseFile>,
) -> BTreeSet<OverrideField> {
    let mut fields = BTreeSet::new();

    if let Some(case_file) = suggestion {
        if decision.severity != case_file.severity.value {
            fields.insert(OverrideField::Severity);
        }
        if decision.next_step != case_file.next_step.value {
            fields.insert(OverrideField::NextStep);
        }
        if decision.estimate_total != case_file.estimate.total {
            fields.insert(OverrideField::Estimate);
        }
    }

    let line_item_total = if decision.line_items.is_empty() {
        suggestion.map(|c| c.estimate.total)
    } else {
        Some(sum_line_items(&decision.line_items))
    };
    if line_item_total.is_some_and(|total| diverges(decision.estimate_total, total)) {
        fields.insert(OverrideField::Estimate);
    }

    fields
}

/// First overridden field without a non-empty reason, if any.
pub fn check_override_reasons(decision: &AgentDecision, suggestion: Option<&CaseFile>) -> Outcome {
    match detect_overrides(decision, suggestion)
        .into_iter()
        .find(|field| !decision.has_reason(*field))
    {
        Some(field) => Err(GuardrailError::MissingOverrideReason(field)),
        None => Ok(()),
    }
}

fn ensure_writable(claim: &Claim) -> Outcome {
    if claim.read_only {
        return Err(GuardrailError::ReadOnly(claim.id.clone()));
    }
    Ok(())
}

fn ensure_status(claim: &Claim, action: &'static str, allowed: &[ClaimStatus]) -> Outcome {
    if allowed.contains(&claim.status) {
        Ok(())
    } else {
        Err(GuardrailError::InvalidTransition {
            action,
            status: claim.status,
        })
    }
}

/// Stamps `opened_at` the first time an agent opens the claim.
pub fn open(claim: &mut Claim, actor: &str, now: DateTime<Utc>) -> Outcome {
    ensure_writable(claim)?;
    if claim.milestones.opened_at.is_some() {
        return Ok(());
    }
    claim.milestones.opened_at = Some(now);
    claim.record(EventKind::ClaimOpened, actor, "Claim opened for review", now);
    Ok(())
}

/// Whether an assessment may be run and recorded for `claim`.
pub fn ensure_can_assess(claim: &Claim) -> Outcome {
    ensure_writable(claim)?;
    if claim.status == ClaimStatus::Authorized {
        return Err(GuardrailError::InvalidTransition {
            action: "record an assessment",
            status: claim.status,
        });
    }
    Ok(())
}

/// Stores a fresh assessment (and the case file built from it). Low
/// confidence sends the claim back for photos whatever its status.
pub fn record_assessment(
    claim: &mut Claim,
    assessment: AiAssessment,
    case_file: Option<CaseFile>,
    actor: &str,
    now: DateTime<Utc>,
) -> Outcome {
    ensure_can_assess(claim)?;

    let low_confidence = assessment.confidence.value() < LOW_CONFIDENCE_THRESHOLD;
    let message = format!(
        "AI assessment: {} severity at {} confidence",
        assessment.severity, assessment.confidence
    );

    claim.ai_assessment = Some(assessment);
    if case_file.is_some() {
        claim.case_file = case_file;
    }
    claim.milestones.ai_assessed_at = Some(now);
    if low_confidence {
        claim.status = ClaimStatus::NeedsMorePhotos;
    }
    claim.record(EventKind::AssessmentCompleted, actor, message, now);

    info!(claim_id = %claim.id, status = %claim.status, "Assessment recorded");
    Ok(())
}

pub fn request_more_photos(
    claim: &mut Claim,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Outcome {
    ensure_writable(claim)?;
    ensure_status(
        claim,
        "request more photos",
        &[ClaimStatus::New, ClaimStatus::InReview],
    )?;

    claim.status = ClaimStatus::NeedsMorePhotos;
    let message = if reason.trim().is_empty() {
        "More photos requested".to_string()
    } else {
        format!("More photos requested: {}", reason.trim())
    };
    claim.record(EventKind::MorePhotosRequested, actor, message, now);
    Ok(())
}

/// New photos put a claim waiting on photos back into review.
pub fn add_photos(
    claim: &mut Claim,
    photos: Vec<Photo>,
    actor: &str,
    now: DateTime<Utc>,
) -> Outcome {
    ensure_writable(claim)?;
    ensure_status(
        claim,
        "add photos",
        &[
            ClaimStatus::New,
            ClaimStatus::InReview,
            ClaimStatus::NeedsMorePhotos,
        ],
    )?;

    let count = photos.len();
    claim.photos.extend(photos);
    if claim.status == ClaimStatus::NeedsMorePhotos {
        claim.status = ClaimStatus::InReview;
    }
    claim.record(
        EventKind::PhotosAdded,
        actor,
        format!("{count} photo(s) added"),
        now,
    );
    Ok(())
}

pub fn save_draft(
    claim: &mut Claim,
    decision: AgentDecision,
    actor: &str,
    now: DateTime<Utc>,
) -> Outcome {
    ensure_writable(claim)?;
    ensure_status(
        claim,
        "save a draft",
        &[
            ClaimStatus::New,
            ClaimStatus::InReview,
            ClaimStatus::NeedsMorePhotos,
        ],
    )?;
    check_override_reasons(&decision, claim.case_file.as_ref())?;

    let overrides = detect_overrides(&decision, claim.case_file.as_ref()).len();
    claim.agent_decision = Some(decision);
    claim.milestones.draft_saved_at = Some(now);
    if matches!(claim.status, ClaimStatus::New | ClaimStatus::NeedsMorePhotos) {
        claim.status = ClaimStatus::InReview;
    }
    claim.record(
        EventKind::DraftSaved,
        actor,
        format!("Draft saved with {overrides} override(s)"),
        now,
    );
    Ok(())
}

pub fn submit_for_approval(claim: &mut Claim, actor: &str, now: DateTime<Utc>) -> Outcome {
    ensure_writable(claim)?;
    ensure_status(claim, "submit for approval", &[ClaimStatus::InReview])?;
    let decision = claim
        .agent_decision
        .as_ref()
        .ok_or(GuardrailError::MissingDecision)?;
    check_override_reasons(decision, claim.case_file.as_ref())?;

    claim.status = ClaimStatus::PendingApproval;
    claim.milestones.submitted_for_approval_at = Some(now);
    claim.record(
        EventKind::SubmittedForApproval,
        actor,
        "Submitted for senior approval",
        now,
    );
    info!(claim_id = %claim.id, "Claim submitted for approval");
    Ok(())
}

/// Senior sign-off on a claim that is pending approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approver: String,
    pub review_confirmed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn approve(claim: &mut Claim, request: ApprovalRequest, now: DateTime<Utc>) -> Outcome {
    ensure_writable(claim)?;
    ensure_status(claim, "approve", &[ClaimStatus::PendingApproval])?;
    if !request.review_confirmed {
        return Err(GuardrailError::SeniorReviewRequired);
    }

    let message = format!("Approved and authorized by {}", request.approver);
    claim.status = ClaimStatus::Authorized;
    claim.milestones.approved_at = Some(now);
    claim.milestones.authorized_at = Some(now);
    claim.senior_approval = Some(SeniorApproval {
        approver: request.approver.clone(),
        approved_at: now,
        review_confirmed: true,
        note: request.note,
    });
    claim.record(EventKind::Approved, &request.approver, message, now);
    info!(claim_id = %claim.id, approver = %request.approver, "Claim authorized");
    Ok(())
}

pub fn update_notes(claim: &mut Claim, notes: &str, actor: &str, now: DateTime<Utc>) -> Outcome {
    ensure_writable(claim)?;
    claim.agent_notes = notes.to_string();
    claim.record(EventKind::NotesUpdated, actor, "Agent notes updated", now);
    Ok(())
}

pub fn assign(claim: &mut Claim, assignee: &str, actor: &str, now: DateTime<Utc>) -> Outcome {
    ensure_writable(claim)?;
    claim.assignee = Some(assignee.to_string());
    claim.record(
        EventKind::Assigned,
        actor,
        format!("Assigned to {assignee}"),
        now,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::RecommendedAction;
    use crate::model::{Confidence, Vehicle};
    use crate::synthesis::CaseSynthesizer;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn assessment(confidence: f64) -> AiAssessment {
        AiAssessment {
            damage_types: vec!["Front bumper".to_string()],
            severity: Severity::Low,
            confidence: Confidence::normalize(confidence),
            recommended_action: RecommendedAction::Approve,
            repair_min_days: 2,
            repair_max_days: 6,
            repair_confidence: Confidence::new(0.65),
            rationale: Vec::new(),
        }
    }

    fn claim() -> Claim {
        let mut claim = Claim::new("CLM-2001", Vehicle::new(2020, "Honda", "Civic"), t0());
        claim.photos = vec![
            Photo::new("p1", "front.jpg", "u1"),
            Photo::new("p2", "rear.jpg", "u2"),
        ];
        claim
    }

    async fn assessed_claim() -> Claim {
        let mut claim = claim();
        claim.ai_assessment = Some(assessment(0.9));
        let case_file = CaseSynthesizer::default()
            .synthesize_case_file(&claim)
            .await
            .unwrap();
        record_assessment(&mut claim, assessment(0.9), Some(case_file), "agent", t0()).unwrap();
        claim
    }

    #[test]
    fn test_low_confidence_assessment_forces_more_photos() {
        let mut c = claim();
        c.status = ClaimStatus::InReview;
        record_assessment(&mut c, assessment(55.0), None, "agent", t0()).unwrap();
        assert_eq!(c.status, ClaimStatus::NeedsMorePhotos);
        assert_eq!(c.milestones.ai_assessed_at, Some(t0()));
        assert_eq!(c.timeline.len(), 1);
    }

    #[test]
    fn test_assessment_rejected_when_authorized_or_read_only() {
        let mut c = claim();
        c.status = ClaimStatus::Authorized;
        let before = c.clone();
        let err = record_assessment(&mut c, assessment(0.4), None, "agent", t0()).unwrap_err();
        assert!(matches!(err, GuardrailError::InvalidTransition { .. }));
        assert_eq!(c, before);

        let mut imported = claim();
        imported.read_only = true;
        let err = update_notes(&mut imported, "x", "agent", t0()).unwrap_err();
        assert_eq!(err, GuardrailError::ReadOnly("CLM-2001".to_string()));
        assert!(imported.timeline.is_empty());
    }

    #[tokio::test]
    async fn test_draft_then_submit_then_approve() {
        let mut c = assessed_claim().await;
        let case_file = c.case_file.clone().unwrap();

        save_draft(
            &mut c,
            AgentDecision::accept_suggestion(&case_file),
            "agent",
            t0() + Duration::minutes(5),
        )
        .unwrap();
        assert_eq!(c.status, ClaimStatus::InReview);

        submit_for_approval(&mut c, "agent", t0() + Duration::minutes(6)).unwrap();
        assert_eq!(c.status, ClaimStatus::PendingApproval);

        let not_confirmed = ApprovalRequest {
            approver: "senior".to_string(),
            review_confirmed: false,
            note: None,
        };
        let err = approve(&mut c, not_confirmed, t0() + Duration::minutes(7)).unwrap_err();
        assert_eq!(err, GuardrailError::SeniorReviewRequired);
        assert_eq!(c.status, ClaimStatus::PendingApproval);

        let confirmed = ApprovalRequest {
            approver: "senior".to_string(),
            review_confirmed: true,
            note: Some("ok".to_string()),
        };
        approve(&mut c, confirmed, t0() + Duration::minutes(8)).unwrap();
        assert_eq!(c.status, ClaimStatus::Authorized);
        assert_eq!(c.milestones.authorized_at, Some(t0() + Duration::minutes(8)));
        assert_eq!(c.milestones.last_updated_at, t0() + Duration::minutes(8));
        assert_eq!(c.timeline.len(), 4);
        assert_eq!(c.timeline.last().unwrap().kind, EventKind::Approved);
    }

    #[tokio::test]
    async fn test_unexplained_override_blocks_draft_and_leaves_claim_unchanged() {
        let mut c = assessed_claim().await;
        let case_file = c.case_file.clone().unwrap();
        let mut decision = AgentDecision::accept_suggestion(&case_file);
        decision.severity = Severity::High;

        let before = c.clone();
        let err = save_draft(&mut c, decision.clone(), "agent", t0()).unwrap_err();
        assert_eq!(
            err,
            GuardrailError::MissingOverrideReason(OverrideField::Severity)
        );
        assert_eq!(c, before);

        let blank = decision.clone().with_reason(OverrideField::Severity, "   ");
        assert!(save_draft(&mut c, blank, "agent", t0()).is_err());

        let explained = decision.with_reason(OverrideField::Severity, "Frame damage in teardown");
        save_draft(&mut c, explained, "agent", t0()).unwrap();
        assert_eq!(c.status, ClaimStatus::InReview);
    }

    #[tokio::test]
    async fn test_estimate_divergence_needs_a_reason() {
        let c = assessed_claim().await;
        let case_file = c.case_file.clone().unwrap();
        let mut decision = AgentDecision::accept_suggestion(&case_file);

        // within 10% of the line items but different from the AI total
        decision.estimate_total = case_file.estimate.total + 5;
        assert_eq!(
            detect_overrides(&decision, Some(&case_file)),
            BTreeSet::from([OverrideField::Estimate])
        );

        // no case file: only the divergence check applies
        assert!(detect_overrides(&decision, None).is_empty());
        decision.estimate_total = case_file.estimate.total * 2;
        assert_eq!(
            detect_overrides(&decision, None),
            BTreeSet::from([OverrideField::Estimate])
        );
    }

    #[tokio::test]
    async fn test_submit_requires_in_review_and_a_decision() {
        let mut c = claim();
        let err = submit_for_approval(&mut c, "agent", t0()).unwrap_err();
        assert!(matches!(
            err,
            GuardrailError::InvalidTransition {
                status: ClaimStatus::New,
                ..
            }
        ));

        c.status = ClaimStatus::InReview;
        let err = submit_for_approval(&mut c, "agent", t0()).unwrap_err();
        assert_eq!(err, GuardrailError::MissingDecision);

        let mut c = assessed_claim().await;
        let case_file = c.case_file.clone().unwrap();
        save_draft(&mut c, AgentDecision::accept_suggestion(&case_file), "agent", t0()).unwrap();
        // an override slipped into the stored decision still blocks submit
        if let Some(decision) = c.agent_decision.as_mut() {
            decision.next_step = NextStep::Tow;
        }
        let err = submit_for_approval(&mut c, "agent", t0()).unwrap_err();
        assert_eq!(
            err,
            GuardrailError::MissingOverrideReason(OverrideField::NextStep)
        );
        assert_eq!(c.status, ClaimStatus::InReview);
    }

    #[test]
    fn test_more_photos_round_trip() {
        let mut c = claim();
        c.status = ClaimStatus::InReview;
        request_more_photos(&mut c, "need rear angle", "agent", t0()).unwrap();
        assert_eq!(c.status, ClaimStatus::NeedsMorePhotos);

        add_photos(
            &mut c,
            vec![Photo::new("p3", "rear-close.jpg", "u3")],
            "customer",
            t0(),
        )
        .unwrap();
        assert_eq!(c.status, ClaimStatus::InReview);
        assert_eq!(c.photos.len(), 3);

        c.status = ClaimStatus::PendingApproval;
        assert!(add_photos(&mut c, Vec::new(), "customer", t0()).is_err());
        assert!(request_more_photos(&mut c, "", "agent", t0()).is_err());
    }

    #[test]
    fn test_open_stamps_once_and_last_updated_never_moves_back() {
        let mut c = claim();
        open(&mut c, "agent", t0() + Duration::hours(1)).unwrap();
        open(&mut c, "agent", t0() + Duration::hours(2)).unwrap();
        assert_eq!(c.milestones.opened_at, Some(t0() + Duration::hours(1)));
        assert_eq!(c.timeline.len(), 1);

        assign(&mut c, "dana", "lead", t0()).unwrap();
        assert_eq!(c.assignee.as_deref(), Some("dana"));
        assert_eq!(c.milestones.last_updated_at, t0() + Duration::hours(1));
    }

    #[test]
    fn test_draft_rejected_after_submission() {
        let mut c = claim();
        c.status = ClaimStatus::PendingApproval;
        let decision = AgentDecision {
            severity: Severity::Low,
            next_step: NextStep::Repair,
            estimate_total: 900,
            line_items: Vec::new(),
            override_reasons: BTreeMap::new(),
        };
        let err = save_draft(&mut c, decision, "agent", t0()).unwrap_err();
        assert!(matches!(err, GuardrailError::InvalidTransition { .. }));
    }
}
