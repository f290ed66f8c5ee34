use std::sync::Arc;

use claim_flow::{
    AgentDecision, ApprovalRequest, ClaimDesk, ClaimError, ClaimIntake, ClaimStatus, EngineConfig,
    GuardrailError, JsonFileClaimRepository, OverrideField, PhotoUpload, Severity, TriState,
    Vehicle, model::EventKind,
};

fn intake() -> ClaimIntake {
    ClaimIntake {
        vehicle: Vehicle::new(2020, "Ford", "Escape"),
        drivable: TriState::Yes,
        other_party_involved: TriState::No,
        photos: vec![
            PhotoUpload {
                name: "front-bumper.jpg".to_string(),
                url: "/uploads/front-bumper.jpg".to_string(),
            },
            PhotoUpload {
                name: "fender.jpg".to_string(),
                url: "/uploads/fender.jpg".to_string(),
            },
        ],
        policy: None,
        incident: None,
        request_tow: false,
        pickup_location: None,
    }
}

#[tokio::test]
async fn test_claim_moves_from_intake_to_authorized() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("claims.json");
    let desk = ClaimDesk::new(
        Arc::new(JsonFileClaimRepository::new(&store)),
        &EngineConfig::immediate(),
    );

    let claim = desk.intake(intake()).await.unwrap();
    desk.open_claim(&claim.id, "agent").await.unwrap();

    let assessed = desk.run_assessment(&claim.id, "agent").await.unwrap();
    let case_file = assessed.case_file.clone().unwrap();
    assert_eq!(
        case_file.estimate.total,
        claim_flow::sum_line_items(&case_file.estimate.line_items)
    );

    // bump severity without saying why
    let mut decision = AgentDecision::accept_suggestion(&case_file);
    decision.severity = match case_file.severity.value {
        Severity::High => Severity::Medium,
        _ => Severity::High,
    };
    let err = desk
        .save_draft(&claim.id, decision.clone(), "agent")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Guardrail(GuardrailError::MissingOverrideReason(OverrideField::Severity))
    ));
    let unchanged = desk.get_claim(&claim.id).await.unwrap();
    assert_eq!(unchanged.status, assessed.status);
    assert_eq!(unchanged.timeline.len(), assessed.timeline.len());
    assert!(unchanged.agent_decision.is_none());

    let decision = decision.with_reason(OverrideField::Severity, "Hidden frame damage");
    let drafted = desk.save_draft(&claim.id, decision, "agent").await.unwrap();
    assert_eq!(drafted.status, ClaimStatus::InReview);

    desk.submit_for_approval(&claim.id, "agent").await.unwrap();
    let authorized = desk
        .approve(
            &claim.id,
            ApprovalRequest {
                approver: "senior.lee".to_string(),
                review_confirmed: true,
                note: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(authorized.status, ClaimStatus::Authorized);

    let kinds: Vec<EventKind> = authorized.timeline.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ClaimSubmitted,
            EventKind::ClaimOpened,
            EventKind::AssessmentCompleted,
            EventKind::DraftSaved,
            EventKind::SubmittedForApproval,
            EventKind::Approved,
        ]
    );

    // authorized claims accept no new assessment
    let err = desk.run_assessment(&claim.id, "agent").await.unwrap_err();
    assert!(matches!(err, ClaimError::Guardrail(_)));

    // a second desk on the same file sees the same state
    let reopened = ClaimDesk::new(
        Arc::new(JsonFileClaimRepository::new(&store)),
        &EngineConfig::immediate(),
    );
    let reloaded = reopened.get_claim(&claim.id).await.unwrap();
    assert_eq!(reloaded.status, ClaimStatus::Authorized);
    assert_eq!(reloaded.timeline, authorized.timeline);
}

#[tokio::test]
async fn test_more_photos_loop_returns_to_review() {
    let dir = tempfile::tempdir().unwrap();
    let desk = ClaimDesk::new(
        Arc::new(JsonFileClaimRepository::new(dir.path().join("claims.json"))),
        &EngineConfig::immediate(),
    );

    let claim = desk.intake(intake()).await.unwrap();
    let waiting = desk
        .request_more_photos(&claim.id, "Need the rear quarter", "agent")
        .await
        .unwrap();
    assert_eq!(waiting.status, ClaimStatus::NeedsMorePhotos);

    let updated = desk
        .add_photos(
            &claim.id,
            vec![PhotoUpload {
                name: "rear-quarter.jpg".to_string(),
                url: "/uploads/rear-quarter.jpg".to_string(),
            }],
            "customer",
        )
        .await
        .unwrap();
    assert_eq!(updated.status, ClaimStatus::InReview);
    assert_eq!(updated.photos.len(), 3);
    assert_eq!(updated.photos[2].id, format!("{}-p3", claim.id));
}
