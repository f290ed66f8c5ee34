use serde::{Deserialize, Serialize};

use crate::model::{Confidence, Severity};

const MAX_RATIONALE: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairTimeEstimate {
    pub min_days: u32,
    pub max_days: u32,
    pub confidence: Confidence,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleSurcharge {
    /// EV, electric or luxury: parts and certified labor take longer.
    Specialist,
    Truck,
}

impl VehicleSurcharge {
    fn detect(body_type: &str) -> Option<Self> {
        let lowered = body_type.to_lowercase();
        let is_ev = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "ev");
        if is_ev || lowered.contains("electric") || lowered.contains("luxury") {
            Some(VehicleSurcharge::Specialist)
        } else if lowered.contains("truck") || lowered.contains("pickup") {
            Some(VehicleSurcharge::Truck)
        } else {
            None
        }
    }

    fn days(self) -> (u32, u32) {
        match self {
            VehicleSurcharge::Specialist => (1, 2),
            VehicleSurcharge::Truck => (0, 1),
        }
    }

    fn note(self) -> &'static str {
        match self {
            VehicleSurcharge::Specialist => {
                "EV, electric or luxury vehicles add time for specialist parts and labor."
            }
            VehicleSurcharge::Truck => "Trucks add a day for larger panels and frame checks.",
        }
    }
}

fn base_range(severity: Option<Severity>) -> (u32, u32) {
    match severity {
        Some(Severity::Low) => (2, 4),
        Some(Severity::High) => (10, 16),
        Some(Severity::Medium) | None => (5, 9),
    }
}

fn is_bumper_only(damage_types: &[String]) -> bool {
    !damage_types.is_empty()
        && damage_types
            .iter()
            .all(|d| d.to_lowercase().contains("bumper"))
}

/// Predicts a repair window in days.
///
/// Total loss overrides everything to 10-21 days. Bumper-only damage is a
/// fast repair (2-6 days) whatever the severity. Otherwise the severity band
/// sets the range and the vehicle type can widen it.
pub fn estimate_repair_time(
    severity: Option<Severity>,
    damage_types: &[String],
    body_type: Option<&str>,
    is_total_loss: bool,
) -> RepairTimeEstimate {
    let bumper_only = !is_total_loss && is_bumper_only(damage_types);
    let mut rationale = Vec::new();

    let (mut min_days, mut max_days) = if is_total_loss {
        rationale.push("Total loss handling: valuation, salvage and settlement.".to_string());
        (10, 21)
    } else {
        base_range(severity)
    };

    match severity {
        Some(s) => rationale.push(format!("{} damage sets the base repair window.", s.band())),
        None => rationale.push("Severity unknown; using a moderate repair window.".to_string()),
    }

    if bumper_only {
        rationale.push("Bumper-only damage is usually a fast repair.".to_string());
        min_days = 2;
        max_days = 6;
    }

    if !damage_types.is_empty() {
        rationale.push(format!("Damage noted: {}.", damage_types.join(", ")));
    }

    if !is_total_loss && !bumper_only {
        if let Some(surcharge) = body_type.and_then(VehicleSurcharge::detect) {
            let (extra_min, extra_max) = surcharge.days();
            min_days += extra_min;
            max_days += extra_max;
            rationale.push(surcharge.note().to_string());
        }
    }

    max_days = max_days.max(min_days);

    let mut confidence: f64 = if severity.is_some() { 0.65 } else { 0.50 };
    if damage_types.is_empty() {
        confidence -= 0.05;
    }
    let confidence = Confidence::new(confidence.clamp(0.45, 0.90));

    rationale.truncate(MAX_RATIONALE);

    RepairTimeEstimate {
        min_days,
        max_days,
        confidence,
        rationale,
    }
}
