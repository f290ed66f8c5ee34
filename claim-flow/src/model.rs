use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::assessment::AiAssessment;
use crate::synthesis::CaseFile;
use crate::workflow::AgentDecision;

/// A confidence value on the canonical 0..=1 scale.
///
/// Values arriving from outside (JSON bodies, stored records) may be on either
/// the 0..=1 or the 0..=100 scale; `From<f64>` normalizes both.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    /// Clamp a 0..=1 value.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn from_percent(percent: f64) -> Self {
        Self::new(percent / 100.0)
    }

    /// Accept either scale: anything above 1 is read as a percentage.
    pub fn normalize(raw: f64) -> Self {
        if raw > 1.0 {
            Self::from_percent(raw)
        } else {
            Self::new(raw)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }

    pub fn min(self, other: Confidence) -> Confidence {
        if other.0 < self.0 { other } else { self }
    }
}

impl From<f64> for Confidence {
    fn from(raw: f64) -> Self {
        Self::normalize(raw)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    /// Band name used in repair-time rationale.
    pub fn band(self) -> &'static str {
        match self {
            Severity::Low => "minor",
            Severity::Medium => "moderate",
            Severity::High => "severe",
        }
    }

    /// Parses either vocabulary: low/medium/high or minor/moderate/severe.
    pub fn parse_label(raw: &str) -> Option<Severity> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "severe" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Yes / no / not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unknown,
}

impl TriState {
    pub fn is_no(self) -> bool {
        self == TriState::No
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Yes,
            Some(false) => TriState::No,
            None => TriState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    New,
    #[serde(rename = "In Review")]
    InReview,
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    #[serde(rename = "Needs More Photos")]
    NeedsMorePhotos,
    Authorized,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClaimStatus::New => "New",
            ClaimStatus::InReview => "In Review",
            ClaimStatus::PendingApproval => "Pending Approval",
            ClaimStatus::NeedsMorePhotos => "Needs More Photos",
            ClaimStatus::Authorized => "Authorized",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub year: u16,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub body_type: Option<String>,
}

impl Vehicle {
    pub fn new(year: u16, make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            year,
            make: make.into(),
            model: model.into(),
            body_type: None,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Photo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub policy_id: String,
    pub insured_name: String,
    pub coverage_type: String,
    pub deductible: u32,
    #[serde(default)]
    pub rental_coverage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowStatus {
    Requested,
    Dispatched,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowRequest {
    pub id: String,
    pub status: TowStatus,
    #[serde(default)]
    pub pickup_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OtherPartyDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub insurer: Option<String>,
    #[serde(default)]
    pub plate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncidentDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub narration: Option<String>,
    #[serde(default)]
    pub tow: Option<TowRequest>,
    #[serde(default)]
    pub other_party: Option<OtherPartyDetails>,
    #[serde(default)]
    pub total_loss: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeniorApproval {
    pub approver: String,
    pub approved_at: DateTime<Utc>,
    pub review_confirmed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimMilestones {
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ai_assessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft_saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_for_approval_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authorized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ClaimSubmitted,
    ClaimOpened,
    ClaimImported,
    AssessmentCompleted,
    MorePhotosRequested,
    PhotosAdded,
    DraftSaved,
    SubmittedForApproval,
    Approved,
    NotesUpdated,
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub actor: String,
    pub message: String,
}

impl TimelineEvent {
    pub fn new(
        kind: EventKind,
        actor: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            kind,
            actor: actor.into(),
            message: message.into(),
        }
    }
}

/// Append-only event log. Entries cannot be edited or removed once pushed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline(Vec<TimelineEvent>);

impl Timeline {
    pub fn append(&mut self, event: TimelineEvent) {
        self.0.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEvent> {
        self.0.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub vehicle: Vehicle,
    pub status: ClaimStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub drivable: TriState,
    #[serde(default)]
    pub other_party_involved: TriState,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub policy: Option<PolicySnapshot>,
    #[serde(default)]
    pub incident: Option<IncidentDetails>,
    #[serde(default)]
    pub ai_assessment: Option<AiAssessment>,
    #[serde(default)]
    pub case_file: Option<CaseFile>,
    #[serde(default)]
    pub agent_decision: Option<AgentDecision>,
    #[serde(default)]
    pub senior_approval: Option<SeniorApproval>,
    #[serde(default)]
    pub agent_notes: String,
    #[serde(default)]
    pub timeline: Timeline,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub milestones: ClaimMilestones,
    #[serde(default)]
    pub read_only: bool,
}

impl Claim {
    pub fn new(id: impl Into<String>, vehicle: Vehicle, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            vehicle,
            status: ClaimStatus::New,
            submitted_at,
            drivable: TriState::Unknown,
            other_party_involved: TriState::Unknown,
            photos: Vec::new(),
            policy: None,
            incident: None,
            ai_assessment: None,
            case_file: None,
            agent_decision: None,
            senior_approval: None,
            agent_notes: String::new(),
            timeline: Timeline::default(),
            assignee: None,
            milestones: ClaimMilestones {
                last_updated_at: submitted_at,
                ..ClaimMilestones::default()
            },
            read_only: false,
        }
    }

    /// Moves `last_updated_at` forward; never backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.milestones.last_updated_at {
            self.milestones.last_updated_at = now;
        }
    }

    /// Appends a timeline event and touches the claim.
    pub fn record(
        &mut self,
        kind: EventKind,
        actor: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.timeline.append(TimelineEvent::new(kind, actor, message, now));
        self.touch(now);
    }

    pub fn incident_description(&self) -> &str {
        self.incident
            .as_ref()
            .map(|i| i.description.as_str())
            .unwrap_or("")
    }

    pub fn is_total_loss(&self) -> bool {
        self.incident.as_ref().is_some_and(|i| i.total_loss)
    }
}
