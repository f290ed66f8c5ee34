pub mod assessment;
pub mod comparables;
pub mod config;
pub mod context;
pub mod desk;
pub mod error;
pub mod ids;
pub mod import;
pub mod line_items;
pub mod model;
pub mod pipeline;
pub mod repair_time;
pub mod seed;
pub mod seed_data;
pub mod sequence;
pub mod signals;
pub mod stage;
pub mod storage;
pub mod synthesis;
pub mod vehicle;
pub mod workflow;

// Re-export commonly used types
pub use assessment::{AiAssessment, AssessmentEngine, RecommendedAction};
pub use comparables::{ComparableMatch, ComparableQuery, CostRange, find_comparable_claims};
pub use config::EngineConfig;
pub use context::CaseContext;
pub use desk::{ClaimDesk, ClaimIntake, PhotoUpload};
pub use error::{ClaimError, GuardrailError, LookupError, Result};
pub use line_items::{LineItem, LineItemCategory, generate_line_items, sum_line_items};
pub use model::{Claim, ClaimStatus, Confidence, Photo, Severity, TriState, Vehicle};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use repair_time::{RepairTimeEstimate, estimate_repair_time};
pub use seed::AssessmentSeed;
pub use signals::{Signal, SignalSeverity, evaluate_signals};
pub use stage::{NextAction, Stage, StageResult};
pub use storage::{ClaimRepository, InMemoryClaimRepository, JsonFileClaimRepository};
pub use synthesis::{CaseFile, CaseSynthesizer, Decision, NextStep};
pub use vehicle::VehicleIdentifier;
pub use workflow::{AgentDecision, ApprovalRequest, OverrideField};
