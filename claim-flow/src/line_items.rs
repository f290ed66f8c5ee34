use serde::{Deserialize, Serialize};

use crate::model::Severity;
use crate::seed::hash_str;

const MAX_LINE_ITEMS: usize = 6;
const MIN_ITEMS_BEFORE_SUPPLIES: usize = 3;
const FALLBACK_AREA: &str = "Damage area";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineItemCategory {
    Parts,
    Labor,
    Paint,
    Misc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub category: LineItemCategory,
    pub amount: u32,
}

/// Maps a free-text damage area to its canonical label.
pub fn normalize_area(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    let label = if lowered.contains("bumper") {
        if lowered.contains("rear") {
            "Rear bumper"
        } else if lowered.contains("front") {
            "Front bumper"
        } else {
            "Bumper"
        }
    } else if lowered.contains("quarter") {
        "Quarter panel"
    } else if lowered.contains("door") {
        "Door panel"
    } else if lowered.contains("fender") {
        "Fender"
    } else if lowered.contains("hood") {
        "Hood"
    } else if lowered.contains("headlight")
        || lowered.contains("head light")
        || lowered.contains("headlamp")
    {
        "Headlight assembly"
    } else if lowered.contains("windshield") || lowered.contains("windscreen") {
        "Windshield"
    } else {
        return Some(trimmed.to_string());
    };
    Some(label.to_string())
}

/// Canonical, de-duplicated areas in first-seen order; never empty.
pub fn normalize_areas(raw: &[String]) -> Vec<String> {
    let mut areas: Vec<String> = Vec::new();
    for area in raw.iter().filter_map(|r| normalize_area(r)) {
        if !areas.contains(&area) {
            areas.push(area);
        }
    }
    if areas.is_empty() {
        areas.push(FALLBACK_AREA.to_string());
    }
    areas
}

fn severity_multiplier(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.80,
        Severity::Medium => 1.15,
        Severity::High => 1.55,
    }
}

/// (parts, labor) base costs for a canonical area.
fn base_costs(area: &str) -> (f64, f64) {
    match area {
        "Headlight assembly" | "Windshield" => (520.0, 240.0),
        "Hood" | "Quarter panel" => (640.0, 320.0),
        "Door panel" | "Fender" => (460.0, 280.0),
        _ => (420.0, 250.0),
    }
}

/// Seeded variance in [-20, 20] for the area at `index`.
fn variance(seed: u32, index: usize) -> f64 {
    let shifted = seed >> (index % 16);
    let mixed = shifted.wrapping_add((index as u32).wrapping_mul(7));
    f64::from(mixed % 41) - 20.0
}

/// Nearest 5 currency units, never below 50.
pub fn round_currency(value: f64) -> u32 {
    let rounded = (value / 5.0).round() * 5.0;
    if rounded < 50.0 { 50 } else { rounded as u32 }
}

struct ItemSink<'a> {
    claim_id: &'a str,
    items: Vec<LineItem>,
}

impl ItemSink<'_> {
    fn push(&mut self, description: String, category: LineItemCategory, amount: f64) {
        let id = format!("{}-li-{}", self.claim_id, self.items.len() + 1);
        self.items.push(LineItem {
            id,
            description,
            category,
            amount: round_currency(amount),
        });
    }
}

/// Priced repair line items for a claim. Identical inputs give identical items
/// in identical order.
pub fn generate_line_items(
    claim_id: &str,
    severity: Severity,
    damage_areas: &[String],
) -> Vec<LineItem> {
    let areas = normalize_areas(damage_areas);
    let multiplier = severity_multiplier(severity);
    let seed = hash_str(&format!("{}|{}|{}", claim_id, severity, areas.join(",")));

    let mut sink = ItemSink {
        claim_id,
        items: Vec::new(),
    };

    for (index, area) in areas.iter().enumerate() {
        let (parts, labor) = base_costs(area);
        let delta = variance(seed, index);
        sink.push(
            format!("{area} parts replacement"),
            LineItemCategory::Parts,
            (parts + delta * 2.0) * multiplier,
        );
        sink.push(
            format!("{area} labor and alignment"),
            LineItemCategory::Labor,
            (labor + delta) * multiplier,
        );
    }

    if severity != Severity::Low {
        sink.push(
            "Paint and refinish".to_string(),
            LineItemCategory::Paint,
            340.0 * multiplier,
        );
    }

    if severity == Severity::High {
        sink.push(
            "Calibration and diagnostic scan".to_string(),
            LineItemCategory::Misc,
            420.0 * multiplier,
        );
    }

    if sink.items.len() < MIN_ITEMS_BEFORE_SUPPLIES {
        sink.push(
            "Shop supplies".to_string(),
            LineItemCategory::Misc,
            160.0 * multiplier,
        );
    }

    let mut items = sink.items;
    items.truncate(MAX_LINE_ITEMS);
    items
}

pub fn sum_line_items(items: &[LineItem]) -> u32 {
    items.iter().map(|item| item.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn areas(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_area_labels() {
        assert_eq!(normalize_area("rear bumper cover").as_deref(), Some("Rear bumper"));
        assert_eq!(normalize_area("Front Bumper").as_deref(), Some("Front bumper"));
        assert_eq!(normalize_area("bumper").as_deref(), Some("Bumper"));
        assert_eq!(normalize_area("left quarter").as_deref(), Some("Quarter panel"));
        assert_eq!(normalize_area("driver door").as_deref(), Some("Door panel"));
        assert_eq!(normalize_area("Headlamp").as_deref(), Some("Headlight assembly"));
        assert_eq!(normalize_area("windscreen crack").as_deref(), Some("Windshield"));
        assert_eq!(normalize_area("  Side mirror ").as_deref(), Some("Side mirror"));
        assert_eq!(normalize_area("   "), None);
    }

    #[test]
    fn test_normalize_areas_dedupes_and_falls_back() {
        assert_eq!(
            normalize_areas(&areas(&["Hood", "hood dent", "Fender"])),
            areas(&["Hood", "Fender"])
        );
        assert_eq!(normalize_areas(&[]), areas(&["Damage area"]));
    }

    #[test]
    fn test_round_currency() {
        assert_eq!(round_currency(12.0), 50);
        assert_eq!(round_currency(337.4), 335);
        assert_eq!(round_currency(337.6), 340);
    }

    #[test]
    fn test_low_front_bumper_has_no_paint_or_calibration() {
        let items = generate_line_items("CLM-1001", Severity::Low, &areas(&["Front bumper"]));

        let parts: Vec<_> = items
            .iter()
            .filter(|i| i.category == LineItemCategory::Parts)
            .collect();
        let labor: Vec<_> = items
            .iter()
            .filter(|i| i.category == LineItemCategory::Labor)
            .collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(labor.len(), 1);
        assert!(parts[0].description.starts_with("Front bumper"));
        assert!(labor[0].description.starts_with("Front bumper"));
        assert!(!items.iter().any(|i| i.category == LineItemCategory::Paint));
        assert!(!items.iter().any(|i| i.description.contains("Calibration")));
        // two area items plus shop supplies
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].description, "Shop supplies");
    }

    #[test]
    fn test_high_severity_adds_paint_and_calibration() {
        let items = generate_line_items("CLM-7", Severity::High, &areas(&["Hood"]));
        let descriptions: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "Hood parts replacement",
                "Hood labor and alignment",
                "Paint and refinish",
                "Calibration and diagnostic scan",
            ]
        );
        assert_eq!(items[2].amount, round_currency(340.0 * 1.55));
        assert_eq!(items[3].amount, round_currency(420.0 * 1.55));
    }

    #[test]
    fn test_items_are_truncated_to_six() {
        let items = generate_line_items(
            "CLM-9",
            Severity::High,
            &areas(&["Hood", "Fender", "Door", "Windshield"]),
        );
        assert_eq!(items.len(), 6);
        assert!(items.iter().all(|i| i.category != LineItemCategory::Paint));
    }

    #[test]
    fn test_amounts_are_rounded_and_bounded() {
        let items = generate_line_items(
            "CLM-3",
            Severity::Medium,
            &areas(&["Quarter panel", "Headlight"]),
        );
        for item in &items {
            assert_eq!(item.amount % 5, 0);
            assert!(item.amount >= 50);
        }
        // parts: (640 +/- 40) * 1.15
        assert!(items[0].amount >= 690 && items[0].amount <= 785);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let input = areas(&["Door panel", "Fender"]);
        let first = generate_line_items("CLM-42", Severity::Medium, &input);
        let second = generate_line_items("CLM-42", Severity::Medium, &input);
        assert_eq!(first, second);
        assert_eq!(sum_line_items(&first), first.iter().map(|i| i.amount).sum::<u32>());
    }
}
