//! Advisory review signals. Each check is independent and appends at most
//! one signal; the check order only fixes display order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::assessment::AiAssessment;
use crate::model::{Claim, Confidence, Photo, Severity};
use crate::seed::hash_str;

pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.60;

const MINOR_PHRASES: [&str; 6] = [
    "minor",
    "small",
    "light",
    "cosmetic",
    "just a scratch",
    "only a scratch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub severity: SignalSeverity,
    pub title: String,
    pub action: String,
}

impl Signal {
    fn new(id: &str, severity: SignalSeverity, title: &str, action: &str) -> Self {
        Self {
            id: id.to_string(),
            severity,
            title: title.to_string(),
            action: action.to_string(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == SignalSeverity::Warning
    }
}

pub fn photo_coverage_signal(photos: &[Photo]) -> Option<Signal> {
    (photos.len() < 2).then(|| {
        Signal::new(
            "limited-photos",
            SignalSeverity::Info,
            "Limited photo coverage",
            "Request additional angles of the damaged area.",
        )
    })
}

pub fn low_confidence_signal(assessment: Option<&AiAssessment>) -> Option<Signal> {
    let confidence: Confidence = assessment?.confidence;
    (confidence.value() < LOW_CONFIDENCE_THRESHOLD).then(|| {
        Signal::new(
            "low-confidence",
            SignalSeverity::Warning,
            "Very low AI confidence",
            "Review photos manually before relying on the assessment.",
        )
    })
}

/// Plain substring match on the lowercased notes and incident description,
/// so "slightly" and "headlight" both count as minor language.
pub fn severity_language_signal(
    assessment: Option<&AiAssessment>,
    agent_notes: &str,
    incident_description: &str,
) -> Option<Signal> {
    if assessment?.severity != Severity::High {
        return None;
    }
    let text = format!("{} {}", agent_notes, incident_description).to_lowercase();
    MINOR_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
        .then(|| {
            Signal::new(
                "severity-language-mismatch",
                SignalSeverity::Warning,
                "Severity and note language mismatch",
                "Notes describe minor damage but the assessment is High; confirm with photos.",
            )
        })
}

/// Flags repeated photo names (trimmed, case-insensitive) or repeated URL hashes.
///
/// The URL hash is a hash of the URL string, not of image content, so
/// re-encoded copies of the same image are not caught.
pub fn duplicate_photo_signal(photos: &[Photo]) -> Option<Signal> {
    if photos.len() <= 1 {
        return None;
    }
    let mut names = HashSet::new();
    let mut hashes = HashSet::new();
    let mut duplicate = false;
    for photo in photos {
        let name = photo.name.trim().to_lowercase();
        if !name.is_empty() && !names.insert(name) {
            duplicate = true;
        }
        if !photo.url.is_empty() && !hashes.insert(hash_str(&photo.url)) {
            duplicate = true;
        }
    }
    duplicate.then(|| {
        Signal::new(
            "duplicate-photos",
            SignalSeverity::Info,
            "Potential duplicate photos",
            "Check whether the same photo was uploaded more than once.",
        )
    })
}

/// Signals for `claim` judged against an explicit assessment, which may
/// differ from the one stored on the claim (e.g. a fresh run).
pub fn evaluate_signals_with(claim: &Claim, assessment: Option<&AiAssessment>) -> Vec<Signal> {
    [
        photo_coverage_signal(&claim.photos),
        low_confidence_signal(assessment),
        severity_language_signal(assessment, &claim.agent_notes, claim.incident_description()),
        duplicate_photo_signal(&claim.photos),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn evaluate_signals(claim: &Claim) -> Vec<Signal> {
    evaluate_signals_with(claim, claim.ai_assessment.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AiAssessment, RecommendedAction};
    use crate::model::{IncidentDetails, Vehicle};
    use chrono::{TimeZone, Utc};

    fn assessment(severity: Severity, confidence: f64) -> AiAssessment {
        AiAssessment {
            damage_types: vec!["Hood".to_string()],
            severity,
            confidence: Confidence::normalize(confidence),
            recommended_action: RecommendedAction::Review,
            repair_min_days: 5,
            repair_max_days: 9,
            repair_confidence: Confidence::new(0.65),
            rationale: Vec::new(),
        }
    }

    fn claim(photos: Vec<Photo>) -> Claim {
        let mut claim = Claim::new(
            "CLM-1",
            Vehicle::new(2022, "Mazda", "3"),
            Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap(),
        );
        claim.photos = photos;
        claim
    }

    fn photo(id: &str, name: &str, url: &str) -> Photo {
        Photo::new(id, name, url)
    }

    fn ids(signals: &[Signal]) -> Vec<&str> {
        signals.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_clean_claim_has_no_signals() {
        let mut c = claim(vec![photo("p1", "front.jpg", "a"), photo("p2", "side.jpg", "b")]);
        c.ai_assessment = Some(assessment(Severity::Medium, 0.82));
        assert!(evaluate_signals(&c).is_empty());
    }

    #[test]
    fn test_limited_photo_coverage() {
        let c = claim(vec![photo("p1", "front.jpg", "a")]);
        let signals = evaluate_signals(&c);
        assert_eq!(ids(&signals), vec!["limited-photos"]);
        assert_eq!(signals[0].severity, SignalSeverity::Info);
    }

    #[test]
    fn test_low_confidence_normalizes_percentages() {
        let mut c = claim(vec![photo("p1", "a.jpg", "a"), photo("p2", "b.jpg", "b")]);
        c.ai_assessment = Some(assessment(Severity::Medium, 55.0));
        assert_eq!(ids(&evaluate_signals(&c)), vec!["low-confidence"]);

        c.ai_assessment = Some(assessment(Severity::Medium, 60.0));
        assert!(evaluate_signals(&c).is_empty());
    }

    #[test]
    fn test_severity_language_mismatch() {
        let mut c = claim(vec![photo("p1", "a.jpg", "a"), photo("p2", "b.jpg", "b")]);
        c.ai_assessment = Some(assessment(Severity::High, 0.9));
        c.incident = Some(IncidentDetails {
            description: "It's just a scratch on the door".to_string(),
            ..IncidentDetails::default()
        });
        let signals = evaluate_signals(&c);
        assert_eq!(ids(&signals), vec!["severity-language-mismatch"]);
        assert!(signals[0].is_warning());

        c.ai_assessment = Some(assessment(Severity::Medium, 0.9));
        assert!(evaluate_signals(&c).is_empty());
    }

    #[test]
    fn test_minor_phrases_match_inside_words() {
        let mut c = claim(vec![photo("p1", "a.jpg", "a"), photo("p2", "b.jpg", "b")]);
        c.ai_assessment = Some(assessment(Severity::High, 0.9));
        c.agent_notes = "Hood is only slightly dented, smaller than it looks".to_string();
        assert_eq!(ids(&evaluate_signals(&c)), vec!["severity-language-mismatch"]);

        c.agent_notes = "Customer says damage is COSMETIC".to_string();
        assert_eq!(ids(&evaluate_signals(&c)), vec!["severity-language-mismatch"]);

        c.agent_notes = "Frame bent, airbags deployed".to_string();
        assert!(evaluate_signals(&c).is_empty());
    }

    #[test]
    fn test_duplicate_photo_names_ignore_case_and_whitespace() {
        let c = claim(vec![
            photo("p1", "Front.JPG", "data:a"),
            photo("p2", "  front.jpg ", "data:b"),
        ]);
        assert_eq!(ids(&evaluate_signals(&c)), vec!["duplicate-photos"]);
    }

    #[test]
    fn test_duplicate_photo_urls() {
        let c = claim(vec![
            photo("p1", "one.jpg", "data:image/jpeg;base64,AAAA"),
            photo("p2", "two.jpg", "data:image/jpeg;base64,AAAA"),
        ]);
        assert!(duplicate_photo_signal(&c.photos).is_some());
    }

    #[test]
    fn test_signal_order_is_fixed() {
        let mut c = claim(vec![photo("p1", "x.jpg", "u")]);
        c.ai_assessment = Some(assessment(Severity::High, 0.4));
        c.agent_notes = "minor dent".to_string();
        assert_eq!(
            ids(&evaluate_signals(&c)),
            vec!["limited-photos", "low-confidence", "severity-language-mismatch"]
        );
    }
}
