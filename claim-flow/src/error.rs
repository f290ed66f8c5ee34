use thiserror::Error;

use crate::model::ClaimStatus;
use crate::workflow::OverrideField;

/// A workflow action that is not allowed in the claim's current state.
///
/// Guardrail failures never change the claim; the message is meant to be shown
/// to the agent as an advisory banner.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardrailError {
    #[error("claim {0} is an imported read-only snapshot")]
    ReadOnly(String),

    #[error("cannot {action} while the claim is {status}")]
    InvalidTransition {
        action: &'static str,
        status: ClaimStatus,
    },

    #[error("a reason is required for the {0} override")]
    MissingOverrideReason(OverrideField),

    #[error("senior review must be confirmed before approval")]
    SeniorReviewRequired,

    #[error("save an agent decision before submitting for approval")]
    MissingDecision,
}

/// Recoverable identification failures; callers may retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("no vehicle found for plate {plate}")]
    PlateNotFound { plate: String, state: Option<String> },

    #[error("no vehicle found for VIN {0}")]
    VinNotFound(String),

    #[error("identifier is empty")]
    EmptyIdentifier,
}

impl LookupError {
    /// Text suitable for a retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            LookupError::PlateNotFound { .. } => {
                "We couldn't match that plate. Check the characters and try again.".to_string()
            }
            LookupError::VinNotFound(_) => {
                "We couldn't match that VIN. Try another photo or enter it manually.".to_string()
            }
            LookupError::EmptyIdentifier => "Enter a plate or VIN to look up.".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Photo {photo_id} not found on claim {claim_id}")]
    PhotoNotFound { claim_id: String, photo_id: String },

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Guardrail: {0}")]
    Guardrail(#[from] GuardrailError),

    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Request for {slot} was superseded by a newer request")]
    Superseded { slot: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClaimError>;
