//! Deterministic pseudo-randomness.
//!
//! Every "AI" output in this crate is derived from a polynomial rolling hash of
//! a string seed: `h = h * 31 + unit` over the UTF-16 code units, computed in
//! wrapping 32-bit signed arithmetic, with the absolute value taken at the end.
//! Tests depend on exact reproducibility, so this must never be swapped for a
//! real random source.

use serde::{Deserialize, Serialize};

use crate::comparables::repair_body_type;
use crate::model::Claim;

pub fn hash_str(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Stable seed for the pseudo-assessment generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSeed {
    pub value: String,
    /// Carried alongside the seed so the repair-time estimate can apply
    /// vehicle surcharges.
    pub body_type: Option<String>,
    #[serde(default)]
    pub total_loss: bool,
}

impl AssessmentSeed {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            body_type: None,
            total_loss: false,
        }
    }

    pub fn with_body_type(mut self, body_type: impl Into<String>) -> Self {
        self.body_type = Some(body_type.into());
        self
    }

    /// Seed composed from claim id, vehicle identity, submission time and the
    /// first photo name. Body type and total loss are not part of the hash.
    pub fn from_claim(claim: &Claim) -> Self {
        let first_photo = claim
            .photos
            .first()
            .map(|p| p.name.as_str())
            .unwrap_or("no-photo");
        let value = format!(
            "{}|{} {} {}|{}|{}",
            claim.id,
            claim.vehicle.year,
            claim.vehicle.make,
            claim.vehicle.model,
            claim.submitted_at.to_rfc3339(),
            first_photo
        );
        Self {
            value,
            body_type: Some(repair_body_type(&claim.vehicle)),
            total_loss: claim.is_total_loss(),
        }
    }

    pub fn hash(&self) -> u32 {
        hash_str(&self.value)
    }
}
