//! Seeded pseudo-assessment generator.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::model::{Confidence, Severity};
use crate::repair_time::estimate_repair_time;
use crate::seed::AssessmentSeed;

pub const DAMAGE_LABELS: [&str; 8] = [
    "Front bumper",
    "Rear bumper",
    "Door panel",
    "Fender",
    "Hood",
    "Headlight assembly",
    "Quarter panel",
    "Windshield",
];

/// What the pseudo-AI thinks should happen with the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    Approve,
    Review,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAssessment {
    pub damage_types: Vec<String>,
    pub severity: Severity,
    pub confidence: Confidence,
    pub recommended_action: RecommendedAction,
    pub repair_min_days: u32,
    pub repair_max_days: u32,
    pub repair_confidence: Confidence,
    #[serde(default)]
    pub rationale: Vec<String>,
}

/// Deterministic assessment for a seed. Same seed, same output.
pub fn assess(seed: &AssessmentSeed) -> AiAssessment {
    let h = seed.hash();

    let severity = Severity::ALL[(h % 3) as usize];
    let confidence_percent = 65 + (h >> 3) % 31;
    let confidence = Confidence::from_percent(f64::from(confidence_percent));

    let label_count = DAMAGE_LABELS.len() as u32;
    let primary = ((h >> 5) % label_count) as usize;
    let mut damage_types = vec![DAMAGE_LABELS[primary].to_string()];
    if (h >> 9) & 1 == 1 {
        let offset = 1 + ((h >> 11) % (label_count - 1)) as usize;
        let secondary = (primary + offset) % DAMAGE_LABELS.len();
        damage_types.push(DAMAGE_LABELS[secondary].to_string());
    }

    let recommended_action = match severity {
        Severity::High => RecommendedAction::Escalate,
        Severity::Low if confidence.value() >= 0.80 => RecommendedAction::Approve,
        _ => RecommendedAction::Review,
    };

    let repair = estimate_repair_time(
        Some(severity),
        &damage_types,
        seed.body_type.as_deref(),
        seed.total_loss,
    );

    let rationale = vec![
        format!(
            "Visible damage to {} consistent with {} severity.",
            damage_types.join(" and ").to_lowercase(),
            severity.band()
        ),
        format!("Model confidence {} from the submitted photos.", confidence),
    ];

    AiAssessment {
        damage_types,
        severity,
        confidence,
        recommended_action,
        repair_min_days: repair.min_days,
        repair_max_days: repair.max_days,
        repair_confidence: repair.confidence,
        rationale,
    }
}

/// Async front for [`assess`] that models the latency of a remote model call.
/// Always resolves; never returns a partial result.
#[derive(Debug, Clone)]
pub struct AssessmentEngine {
    latency: Duration,
}

impl AssessmentEngine {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// No simulated latency.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn generate_assessment(&self, seed: &AssessmentSeed) -> AiAssessment {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let assessment = assess(seed);
        info!(
            severity = %assessment.severity,
            confidence = %assessment.confidence,
            "Generated damage assessment"
        );
        assessment
    }
}

impl Default for AssessmentEngine {
    fn default() -> Self {
        Self::immediate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_is_deterministic() {
        let seed =
            AssessmentSeed::new("CLM-1001|2021 Toyota Camry|2024-05-01T09:00:00+00:00|front.jpg");
        assert_eq!(assess(&seed), assess(&seed));
    }

    #[test]
    fn test_assess_respects_ranges() {
        for i in 0..200 {
            let seed = AssessmentSeed::new(format!("claim-{i}|photo-{}", i * 7));
            let a = assess(&seed);
            assert!(a.confidence.value() >= 0.65 && a.confidence.value() <= 0.95);
            assert!(!a.damage_types.is_empty() && a.damage_types.len() <= 2);
            if a.damage_types.len() == 2 {
                assert_ne!(a.damage_types[0], a.damage_types[1]);
            }
            assert!(a.repair_min_days <= a.repair_max_days);
            if a.severity == Severity::High {
                assert_eq!(a.recommended_action, RecommendedAction::Escalate);
            }
        }
    }

    #[test]
    fn test_seeds_cover_every_severity() {
        let severities: std::collections::HashSet<Severity> = (0..50)
            .map(|i| assess(&AssessmentSeed::new(format!("seed-{i}"))).severity)
            .collect();
        assert_eq!(severities.len(), 3);
    }

    #[tokio::test]
    async fn test_engine_matches_pure_function() {
        let engine = AssessmentEngine::new(Duration::from_millis(5));
        let seed = AssessmentSeed::new("CLM-2002").with_body_type("truck");
        let generated = engine.generate_assessment(&seed).await;
        assert_eq!(generated, assess(&seed));
    }
}
