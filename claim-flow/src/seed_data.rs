//! Demo claims used when a repository has nothing better to offer.

use chrono::{DateTime, TimeZone, Utc};

use crate::model::{
    Claim, ClaimStatus, EventKind, IncidentDetails, OtherPartyDetails, Photo, PolicySnapshot,
    TowRequest, TowStatus, TriState, Vehicle,
};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

fn policy(
    id: &str,
    insured: &str,
    coverage: &str,
    deductible: u32,
    rental: bool,
) -> PolicySnapshot {
    PolicySnapshot {
        policy_id: id.to_string(),
        insured_name: insured.to_string(),
        coverage_type: coverage.to_string(),
        deductible,
        rental_coverage: rental,
    }
}

fn submitted(mut claim: Claim) -> Claim {
    let at = claim.submitted_at;
    claim.record(
        EventKind::ClaimSubmitted,
        "customer",
        "Claim submitted through intake",
        at,
    );
    claim
}

/// The default claim set, at fixed timestamps.
pub fn default_claims() -> Vec<Claim> {
    let mut camry = Claim::new("CLM-1001", Vehicle::new(2021, "Toyota", "Camry"), at(3, 9, 15));
    camry.drivable = TriState::Yes;
    camry.other_party_involved = TriState::Yes;
    camry.photos = vec![
        Photo::new("CLM-1001-p1", "rear-bumper.jpg", "/demo/clm-1001/rear-bumper.jpg"),
        Photo::new("CLM-1001-p2", "rear-left.jpg", "/demo/clm-1001/rear-left.jpg"),
    ];
    camry.policy = Some(policy("POL-88213", "Jordan Avery", "Collision", 500, true));
    camry.incident = Some(IncidentDetails {
        description: "Rear-ended at a stop light, bumper pushed in".to_string(),
        other_party: Some(OtherPartyDetails {
            name: Some("Sam Ortiz".to_string()),
            insurer: Some("Northwind Mutual".to_string()),
            plate: Some("7KDL442".to_string()),
        }),
        ..IncidentDetails::default()
    });

    let mut f150 = Claim::new("CLM-1002", Vehicle::new(2019, "Ford", "F-150"), at(4, 16, 40));
    f150.status = ClaimStatus::InReview;
    f150.drivable = TriState::No;
    f150.other_party_involved = TriState::No;
    f150.photos = vec![
        Photo::new("CLM-1002-p1", "front.jpg", "/demo/clm-1002/front.jpg"),
        Photo::new("CLM-1002-p2", "hood.jpg", "/demo/clm-1002/hood.jpg"),
        Photo::new("CLM-1002-p3", "headlight.jpg", "/demo/clm-1002/headlight.jpg"),
    ];
    f150.policy = Some(policy("POL-55102", "Riley Chen", "Comprehensive", 1000, false));
    f150.incident = Some(IncidentDetails {
        description: "Hit a deer on the highway, front end crushed and coolant leaking".to_string(),
        narration: Some("Truck would not restart after the impact.".to_string()),
        tow: Some(TowRequest {
            id: "TOW-5001".to_string(),
            status: TowStatus::Dispatched,
            pickup_location: Some("Mile 42, Route 9".to_string()),
        }),
        ..IncidentDetails::default()
    });
    f150.assignee = Some("agent.morgan".to_string());
    f150.milestones.opened_at = Some(at(4, 17, 5));

    let mut model3 = Claim::new(
        "CLM-1003",
        Vehicle {
            body_type: Some("EV".to_string()),
            ..Vehicle::new(2023, "Tesla", "Model 3")
        },
        at(5, 11, 0),
    );
    model3.status = ClaimStatus::NeedsMorePhotos;
    model3.drivable = TriState::Yes;
    model3.photos = vec![Photo::new(
        "CLM-1003-p1",
        "door.jpg",
        "/demo/clm-1003/door.jpg",
    )];
    model3.policy = Some(policy("POL-90417", "Alex Kim", "Collision", 250, true));
    model3.incident = Some(IncidentDetails {
        description: "Minor scrape along the passenger door in a parking garage".to_string(),
        ..IncidentDetails::default()
    });

    let mut outback = Claim::new("CLM-1004", Vehicle::new(2018, "Subaru", "Outback"), at(6, 8, 20));
    outback.drivable = TriState::Unknown;
    outback.photos = vec![
        Photo::new("CLM-1004-p1", "windshield.jpg", "/demo/clm-1004/windshield.jpg"),
        Photo::new("CLM-1004-p2", "Windshield.JPG", "/demo/clm-1004/windshield-2.jpg"),
    ];
    outback.incident = Some(IncidentDetails {
        description: "Rock chip spread across the windshield".to_string(),
        ..IncidentDetails::default()
    });

    vec![
        submitted(camry),
        submitted(f150),
        submitted(model3),
        submitted(outback),
    ]
}
