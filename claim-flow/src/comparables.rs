//! Comparable-claims matcher over a fixed catalogue of closed claims.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::model::{Severity, Vehicle};

pub const MIN_MATCHES: usize = 3;
pub const MAX_MATCHES: usize = 5;

const AREA_TOKENS: [&str; 8] = [
    "front",
    "rear",
    "bumper",
    "door",
    "fender",
    "hood",
    "headlight",
    "windshield",
];

const TRUCK_KEYWORDS: &[&str] = &[
    "truck", "pickup", "f-150", "f150", "silverado", "sierra", "ram", "tacoma", "tundra",
    "ranger", "frontier", "colorado",
];
const WAGON_KEYWORDS: &[&str] = &["wagon", "outback", "allroad", "v60", "v90", "estate"];
const SUV_KEYWORDS: &[&str] = &[
    "suv", "cr-v", "crv", "rav4", "explorer", "tahoe", "highlander", "cx-5", "rogue", "escape",
    "pilot", "wrangler", "forester", "model y", "4runner", "santa fe",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Truck,
    Wagon,
    Suv,
    Sedan,
}

impl VehicleClass {
    pub fn label(self) -> &'static str {
        match self {
            VehicleClass::Truck => "truck",
            VehicleClass::Wagon => "wagon",
            VehicleClass::Suv => "suv",
            VehicleClass::Sedan => "sedan",
        }
    }
}

fn has_keyword(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        if keyword.len() <= 3 {
            // short names like "ram" must match a whole word
            haystack
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '-')
                .any(|word| word == *keyword)
        } else {
            haystack.contains(keyword)
        }
    })
}

/// Body type used for repair-time surcharges: the stated one, else the
/// class inferred from make and model.
pub fn repair_body_type(vehicle: &Vehicle) -> String {
    vehicle
        .body_type
        .clone()
        .unwrap_or_else(|| classify_vehicle(&vehicle.make, &vehicle.model).label().to_string())
}

/// Coarse vehicle type from make and model.
pub fn classify_vehicle(make: &str, model: &str) -> VehicleClass {
    let haystack = format!("{} {}", make, model).to_lowercase();
    if has_keyword(&haystack, TRUCK_KEYWORDS) {
        VehicleClass::Truck
    } else if has_keyword(&haystack, WAGON_KEYWORDS) {
        VehicleClass::Wagon
    } else if has_keyword(&haystack, SUV_KEYWORDS) {
        VehicleClass::Suv
    } else {
        VehicleClass::Sedan
    }
}

/// Canonical tokens for a damage area; falls back to the trimmed lowercase text.
pub fn area_tokens(raw: &str) -> Vec<String> {
    let lowered = raw.trim().to_lowercase();
    let tokens: Vec<String> = AREA_TOKENS
        .iter()
        .filter(|token| lowered.contains(*token))
        .map(|token| token.to_string())
        .collect();
    if tokens.is_empty() && !lowered.is_empty() {
        vec![lowered]
    } else {
        tokens
    }
}

fn token_set(areas: &[String]) -> BTreeSet<String> {
    areas.iter().flat_map(|a| area_tokens(a)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalClaim {
    pub id: String,
    pub make: String,
    pub model: String,
    pub severity: Severity,
    pub damage_areas: Vec<String>,
    pub final_repair_cost: u32,
    pub repair_days: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableMatch {
    pub claim: HistoricalClaim,
    pub score: u32,
    pub overlapping_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableQuery {
    pub make: String,
    pub model: String,
    pub severity: Severity,
    pub damage_areas: Vec<String>,
}

fn historical(
    id: &str,
    make: &str,
    model: &str,
    severity: Severity,
    areas: &[&str],
    cost: u32,
    days: u32,
    description: &str,
) -> HistoricalClaim {
    HistoricalClaim {
        id: id.to_string(),
        make: make.to_string(),
        model: model.to_string(),
        severity,
        damage_areas: areas.iter().map(|a| a.to_string()).collect(),
        final_repair_cost: cost,
        repair_days: days,
        description: description.to_string(),
    }
}

static CATALOG: LazyLock<Vec<HistoricalClaim>> = LazyLock::new(|| {
    vec![
        historical(
            "HX-2101",
            "Toyota",
            "Camry",
            Severity::Low,
            &["Rear bumper"],
            1180,
            3,
            "Low-speed parking lot backing incident, bumper cover respray.",
        ),
        historical(
            "HX-2102",
            "Honda",
            "Civic",
            Severity::Low,
            &["Front bumper", "Headlight assembly"],
            1420,
            4,
            "Nose-in contact with a post, replaced bumper cover and headlamp.",
        ),
        historical(
            "HX-2103",
            "Ford",
            "F-150",
            Severity::Medium,
            &["Door panel", "Fender"],
            3350,
            7,
            "Side swipe in a merge, door skin and fender replaced.",
        ),
        historical(
            "HX-2104",
            "Subaru",
            "Outback",
            Severity::Medium,
            &["Rear bumper", "Quarter panel"],
            2980,
            6,
            "Rear-ended at a light, bumper and quarter panel repair.",
        ),
        historical(
            "HX-2105",
            "Tesla",
            "Model 3",
            Severity::High,
            &["Front bumper", "Hood", "Headlight assembly"],
            8120,
            15,
            "Front-end collision, sensor calibration and hood replacement.",
        ),
        historical(
            "HX-2106",
            "Chevrolet",
            "Silverado",
            Severity::High,
            &["Front bumper", "Fender", "Hood"],
            7450,
            14,
            "Deer strike at highway speed, front clip rebuild.",
        ),
        historical(
            "HX-2107",
            "Honda",
            "CR-V",
            Severity::Medium,
            &["Door panel"],
            2260,
            5,
            "Door dent from a shopping cart corral, PDR not possible.",
        ),
        historical(
            "HX-2108",
            "Toyota",
            "RAV4",
            Severity::Low,
            &["Windshield"],
            640,
            2,
            "Rock chip spread into a crack, windshield replaced.",
        ),
        historical(
            "HX-2109",
            "Nissan",
            "Altima",
            Severity::Medium,
            &["Front bumper", "Fender"],
            2710,
            6,
            "Low-speed intersection collision, bumper and fender.",
        ),
        historical(
            "HX-2110",
            "BMW",
            "330i",
            Severity::High,
            &["Door panel", "Quarter panel"],
            6890,
            13,
            "T-bone at passenger side, door and quarter panel replaced.",
        ),
        historical(
            "HX-2111",
            "Ford",
            "Escape",
            Severity::Low,
            &["Rear bumper"],
            980,
            3,
            "Tapped while parked, rear bumper scuffs refinished.",
        ),
        historical(
            "HX-2112",
            "Hyundai",
            "Elantra",
            Severity::High,
            &["Hood", "Windshield", "Front bumper"],
            5420,
            12,
            "Hood flew open on the highway, windshield and hood replaced.",
        ),
    ]
});

/// The read-only reference catalogue of closed claims.
pub fn reference_catalog() -> &'static [HistoricalClaim] {
    &CATALOG
}

fn score_candidate(
    query: &ComparableQuery,
    query_tokens: &BTreeSet<String>,
    query_class: VehicleClass,
    candidate: &HistoricalClaim,
) -> (u32, Vec<String>) {
    let mut score = 0;
    if candidate.severity == query.severity {
        score += 2;
    }

    let candidate_tokens = token_set(&candidate.damage_areas);
    let overlapping: Vec<String> = query_tokens
        .intersection(&candidate_tokens)
        .cloned()
        .collect();
    score += overlapping.len() as u32;

    let same_make = candidate.make.trim().eq_ignore_ascii_case(query.make.trim());
    let same_class = classify_vehicle(&candidate.make, &candidate.model) == query_class;
    if same_make || same_class {
        score += 1;
    }

    (score, overlapping)
}

/// Ranks `catalog` against the query. The result size is `limit` clamped
/// into 3..=5, and only shorter when fewer candidates score above zero.
pub fn find_comparable_claims_in(
    catalog: &[HistoricalClaim],
    query: &ComparableQuery,
    limit: usize,
) -> Vec<ComparableMatch> {
    let query_tokens = token_set(&query.damage_areas);
    let query_class = classify_vehicle(&query.make, &query.model);

    let mut matches: Vec<ComparableMatch> = catalog
        .iter()
        .filter_map(|candidate| {
            let (score, overlapping_areas) =
                score_candidate(query, &query_tokens, query_class, candidate);
            (score > 0).then(|| ComparableMatch {
                claim: candidate.clone(),
                score,
                overlapping_areas,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.claim.final_repair_cost.cmp(&b.claim.final_repair_cost))
    });
    matches.truncate(limit.clamp(MIN_MATCHES, MAX_MATCHES));
    matches
}

pub fn find_comparable_claims(query: &ComparableQuery, limit: usize) -> Vec<ComparableMatch> {
    find_comparable_claims_in(reference_catalog(), query, limit)
}

/// Min and max final cost across the matches.
pub fn typical_cost_range(matches: &[ComparableMatch]) -> Option<CostRange> {
    let costs = matches.iter().map(|m| m.claim.final_repair_cost);
    let min = costs.clone().min()?;
    let max = costs.max()?;
    Some(CostRange { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(make: &str, model: &str, severity: Severity, areas: &[&str]) -> ComparableQuery {
        ComparableQuery {
            make: make.to_string(),
            model: model.to_string(),
            severity,
            damage_areas: areas.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_classify_vehicle() {
        assert_eq!(classify_vehicle("Ford", "F-150"), VehicleClass::Truck);
        assert_eq!(classify_vehicle("RAM", "1500"), VehicleClass::Truck);
        assert_eq!(classify_vehicle("Subaru", "Outback"), VehicleClass::Wagon);
        assert_eq!(classify_vehicle("Toyota", "RAV4"), VehicleClass::Suv);
        assert_eq!(classify_vehicle("Toyota", "Camry"), VehicleClass::Sedan);
        // short keywords only match whole words
        assert_eq!(classify_vehicle("Acme", "Tramway"), VehicleClass::Sedan);
    }

    #[test]
    fn test_area_tokens() {
        assert_eq!(area_tokens("Front bumper"), vec!["front", "bumper"]);
        assert_eq!(area_tokens(" Side Mirror "), vec!["side mirror"]);
        assert!(area_tokens("   ").is_empty());
    }

    #[test]
    fn test_ranking_prefers_score_then_cheaper() {
        let q = query("Toyota", "Corolla", Severity::Low, &["Rear bumper"]);
        let matches = find_comparable_claims(&q, 5);

        assert_eq!(matches.len(), 5);
        assert_eq!(matches[0].claim.id, "HX-2101");
        assert_eq!(matches[0].score, 5);
        // HX-2111 and HX-2102 both score 4; the cheaper one ranks first.
        assert_eq!(matches[1].claim.id, "HX-2111");
        assert_eq!(matches[2].claim.id, "HX-2102");
        assert_eq!(matches[1].score, 4);
        assert_eq!(matches[0].overlapping_areas, vec!["bumper", "rear"]);
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_limit_is_clamped_into_band() {
        let q = query("Honda", "Accord", Severity::Medium, &["Door panel"]);
        assert_eq!(find_comparable_claims(&q, 1).len(), 3);
        assert_eq!(find_comparable_claims(&q, 4).len(), 4);
        assert_eq!(find_comparable_claims(&q, 50).len(), 5);
    }

    #[test]
    fn test_fewer_results_when_few_candidates_score() {
        let catalog = vec![
            historical("A", "Ford", "F-150", Severity::High, &["Hood"], 9000, 12, "a"),
            historical("B", "Subaru", "Outback", Severity::Low, &["Door panel"], 1000, 3, "b"),
        ];
        let q = query("Kia", "Telluride SUV", Severity::High, &["Windshield"]);
        let matches = find_comparable_claims_in(&catalog, &q, 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].claim.id, "A");
        assert_eq!(matches[0].score, 2);
        assert!(matches[0].overlapping_areas.is_empty());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let q = query("Tesla", "Model Y", Severity::High, &["Front bumper", "Hood"]);
        assert_eq!(find_comparable_claims(&q, 5), find_comparable_claims(&q, 5));
    }

    #[test]
    fn test_typical_cost_range() {
        let q = query("Toyota", "Corolla", Severity::Low, &["Rear bumper"]);
        let matches = find_comparable_claims(&q, 3);
        let range = typical_cost_range(&matches).unwrap();
        assert!(range.min <= range.max);
        assert_eq!(typical_cost_range(&[]), None);
    }
}
