//! ClaimDesk – loads a claim, applies one action, and persists the result.
//!
//! Every desk action follows the same _load → act → save_ shape. A rejected
//! action returns before the save, so the stored claim is untouched.
//!
//! Writes through one desk are serialised, so two actions never interleave
//! their load and save on the same store.
//!
//! The desk owns the per-session state that would otherwise be global: the id
//! allocator and the request sequencer that discards superseded assessment
//! runs. Share one desk across requests:
//! ```rust,ignore
//! struct AppState {
//!     desk: ClaimDesk,
//! }
//!
//! let claim = state.desk.run_assessment(&claim_id, "agent").await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    assessment::AssessmentEngine,
    config::EngineConfig,
    error::{ClaimError, GuardrailError, Result},
    ids::IdAllocator,
    import::{ImportReport, import_claims},
    model::{
        Claim, EventKind, IncidentDetails, Photo, PolicySnapshot, TowRequest, TowStatus, TriState,
        Vehicle,
    },
    seed::AssessmentSeed,
    sequence::RequestSequencer,
    storage::ClaimRepository,
    synthesis::CaseSynthesizer,
    vehicle::{PlateExtraction, VehicleIdentifier, VinExtraction},
    workflow::{self, AgentDecision, ApprovalRequest},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoUpload {
    pub name: String,
    pub url: String,
}

/// What the customer submits through intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimIntake {
    pub vehicle: Vehicle,
    #[serde(default)]
    pub drivable: TriState,
    #[serde(default)]
    pub other_party_involved: TriState,
    #[serde(default)]
    pub photos: Vec<PhotoUpload>,
    #[serde(default)]
    pub policy: Option<PolicySnapshot>,
    #[serde(default)]
    pub incident: Option<IncidentDetails>,
    /// Only honoured when the vehicle is not drivable.
    #[serde(default)]
    pub request_tow: bool,
    #[serde(default)]
    pub pickup_location: Option<String>,
}

fn photos_for(claim_id: &str, start: usize, uploads: Vec<PhotoUpload>) -> Vec<Photo> {
    uploads
        .into_iter()
        .enumerate()
        .map(|(i, upload)| {
            Photo::new(
                format!("{claim_id}-p{}", start + i + 1),
                upload.name,
                upload.url,
            )
        })
        .collect()
}

/// Entry point for every claim action.
#[derive(Clone)]
pub struct ClaimDesk {
    repository: Arc<dyn ClaimRepository>,
    engine: AssessmentEngine,
    synthesizer: CaseSynthesizer,
    identifier: VehicleIdentifier,
    sequencer: Arc<RequestSequencer>,
    ids: Arc<IdAllocator>,
    writes: Arc<Mutex<()>>,
}

impl ClaimDesk {
    pub fn new(repository: Arc<dyn ClaimRepository>, config: &EngineConfig) -> Self {
        let engine = AssessmentEngine::new(config.ai_latency);
        Self {
            repository,
            synthesizer: CaseSynthesizer::new(engine.clone(), config.comparable_limit),
            engine,
            identifier: VehicleIdentifier::new(config.lookup_latency),
            sequencer: Arc::new(RequestSequencer::new()),
            ids: Arc::new(IdAllocator::default()),
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub async fn list_claims(&self) -> Vec<Claim> {
        self.repository.load().await
    }

    pub async fn get_claim(&self, claim_id: &str) -> Result<Claim> {
        self.repository
            .find(claim_id)
            .await
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_id.to_string()))
    }

    /// Load, apply one workflow action, save. Nothing is saved on rejection.
    async fn apply<F>(&self, claim_id: &str, action: F) -> Result<Claim>
    where
        F: FnOnce(&mut Claim, DateTime<Utc>) -> std::result::Result<(), GuardrailError> + Send,
    {
        let _guard = self.writes.lock().await;
        let mut claim = self.get_claim(claim_id).await?;
        if let Err(e) = action(&mut claim, Utc::now()) {
            warn!(claim_id, error = %e, "Action rejected");
            return Err(e.into());
        }
        self.repository.upsert(claim.clone()).await;
        Ok(claim)
    }

    pub async fn intake(&self, intake: ClaimIntake) -> Result<Claim> {
        let _guard = self.writes.lock().await;
        for existing in self.repository.load().await {
            self.ids.observe(&existing.id);
            if let Some(tow) = existing.incident.as_ref().and_then(|i| i.tow.as_ref()) {
                self.ids.observe(&tow.id);
            }
        }
        let now = Utc::now();
        let claim_id = self.ids.next_claim_id();

        let mut claim = Claim::new(claim_id.clone(), intake.vehicle, now);
        claim.drivable = intake.drivable;
        claim.other_party_involved = intake.other_party_involved;
        claim.photos = photos_for(&claim_id, 0, intake.photos);
        claim.policy = intake.policy;
        claim.incident = intake.incident;

        if intake.request_tow && intake.drivable.is_no() {
            let tow = TowRequest {
                id: self.ids.next_tow_id(),
                status: TowStatus::Requested,
                pickup_location: intake.pickup_location,
            };
            claim.incident.get_or_insert_with(IncidentDetails::default).tow = Some(tow);
        }

        claim.record(
            EventKind::ClaimSubmitted,
            "customer",
            format!("Claim submitted with {} photo(s)", claim.photos.len()),
            now,
        );
        self.repository.upsert(claim.clone()).await;

        info!(claim_id = %claim.id, vehicle = %claim.vehicle.display_name(), "Claim submitted");
        Ok(claim)
    }

    pub async fn open_claim(&self, claim_id: &str, actor: &str) -> Result<Claim> {
        self.apply(claim_id, |claim, now| workflow::open(claim, actor, now))
            .await
    }

    /// Runs the AI assessment and builds a fresh case file.
    ///
    /// Returns [`ClaimError::Superseded`] without writing anything when a newer
    /// run for the same claim was started while this one was in flight.
    pub async fn run_assessment(&self, claim_id: &str, actor: &str) -> Result<Claim> {
        let claim = self.get_claim(claim_id).await?;
        workflow::ensure_can_assess(&claim)?;

        let ticket = self.sequencer.issue(format!("assessment:{claim_id}"));
        let assessment = self
            .engine
            .generate_assessment(&AssessmentSeed::from_claim(&claim))
            .await;
        if !self.sequencer.is_current(&ticket) {
            return Err(ClaimError::Superseded { slot: ticket.slot });
        }

        // the claim may have changed while the assessment was in flight
        let _guard = self.writes.lock().await;
        let mut claim = self.get_claim(claim_id).await?;
        let mut scratch = claim.clone();
        scratch.ai_assessment = Some(assessment.clone());
        let case_file = self.synthesizer.synthesize_case_file(&scratch).await?;

        workflow::record_assessment(&mut claim, assessment, Some(case_file), actor, Utc::now())?;
        self.repository.upsert(claim.clone()).await;
        Ok(claim)
    }

    pub async fn save_draft(
        &self,
        claim_id: &str,
        decision: AgentDecision,
        actor: &str,
    ) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            workflow::save_draft(claim, decision, actor, now)
        })
        .await
    }

    pub async fn submit_for_approval(&self, claim_id: &str, actor: &str) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            workflow::submit_for_approval(claim, actor, now)
        })
        .await
    }

    pub async fn approve(&self, claim_id: &str, request: ApprovalRequest) -> Result<Claim> {
        self.apply(claim_id, |claim, now| workflow::approve(claim, request, now))
            .await
    }

    pub async fn request_more_photos(
        &self,
        claim_id: &str,
        reason: &str,
        actor: &str,
    ) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            workflow::request_more_photos(claim, reason, actor, now)
        })
        .await
    }

    pub async fn add_photos(
        &self,
        claim_id: &str,
        uploads: Vec<PhotoUpload>,
        actor: &str,
    ) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            let photos = photos_for(&claim.id, claim.photos.len(), uploads);
            workflow::add_photos(claim, photos, actor, now)
        })
        .await
    }

    pub async fn update_notes(&self, claim_id: &str, notes: &str, actor: &str) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            workflow::update_notes(claim, notes, actor, now)
        })
        .await
    }

    pub async fn assign(&self, claim_id: &str, assignee: &str, actor: &str) -> Result<Claim> {
        self.apply(claim_id, |claim, now| {
            workflow::assign(claim, assignee, actor, now)
        })
        .await
    }

    /// Imports read-only snapshots. Ids that already exist are skipped.
    pub async fn import_snapshot(&self, json: &str) -> Result<ImportReport> {
        let mut report = import_claims(json, Utc::now())?;
        let _guard = self.writes.lock().await;
        let mut claims = self.repository.load().await;

        let mut accepted = Vec::with_capacity(report.imported.len());
        for claim in report.imported.drain(..) {
            if claims.iter().any(|c| c.id == claim.id) {
                warn!(claim_id = %claim.id, "Skipping import of an existing claim id");
                report.dropped.push(claim.id);
                continue;
            }
            self.ids.observe(&claim.id);
            accepted.push(claim);
        }
        claims.extend(accepted.iter().cloned());
        self.repository.save(&claims).await;
        report.imported = accepted;
        Ok(report)
    }

    async fn photo(&self, claim_id: &str, photo_id: &str) -> Result<Photo> {
        let claim = self.get_claim(claim_id).await?;
        claim
            .photos
            .into_iter()
            .find(|p| p.id == photo_id)
            .ok_or_else(|| ClaimError::PhotoNotFound {
                claim_id: claim_id.to_string(),
                photo_id: photo_id.to_string(),
            })
    }

    /// Reads a plate and state off one of the claim's photos.
    pub async fn extract_plate(&self, claim_id: &str, photo_id: &str) -> Result<PlateExtraction> {
        let photo = self.photo(claim_id, photo_id).await?;
        Ok(self.identifier.extract_plate_and_state(&photo).await)
    }

    pub async fn extract_vin(&self, claim_id: &str, photo_id: &str) -> Result<VinExtraction> {
        let photo = self.photo(claim_id, photo_id).await?;
        Ok(self.identifier.extract_vin(&photo).await)
    }

    pub async fn lookup_vehicle(&self, identifier: &str, state: Option<&str>) -> Result<Vehicle> {
        Ok(self.identifier.lookup_vehicle(identifier, state).await?)
    }
}
