use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::model::{Claim, TimelineEvent};
use crate::seed_data::default_claims;

/// Whole-record claim persistence.
///
/// Storage faults are not surfaced: a missing or unreadable store loads as the
/// default claim set and failed writes are logged and dropped.
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    async fn load(&self) -> Vec<Claim>;
    async fn save(&self, claims: &[Claim]);

    /// Appends `event` to the claim's timeline. Replaying an event that is
    /// already present is a no-op.
    async fn append_event(&self, claim_id: &str, event: TimelineEvent);

    async fn find(&self, claim_id: &str) -> Option<Claim> {
        self.load().await.into_iter().find(|c| c.id == claim_id)
    }

    /// Replaces the claim with the same id, or adds it.
    async fn upsert(&self, claim: Claim) {
        let mut claims = self.load().await;
        match claims.iter_mut().find(|c| c.id == claim.id) {
            Some(existing) => *existing = claim,
            None => claims.push(claim),
        }
        self.save(&claims).await;
    }
}

fn append_once(claim: &mut Claim, event: TimelineEvent) -> bool {
    if claim.timeline.iter().any(|e| e.id == event.id) {
        return false;
    }
    let at = event.at;
    claim.timeline.append(event);
    claim.touch(at);
    true
}

/// In-memory implementation of ClaimRepository
pub struct InMemoryClaimRepository {
    claims: Arc<DashMap<String, Claim>>,
}

impl InMemoryClaimRepository {
    pub fn new() -> Self {
        Self {
            claims: Arc::new(DashMap::new()),
        }
    }

    pub fn with_claims(claims: Vec<Claim>) -> Self {
        let repo = Self::new();
        for claim in claims {
            repo.claims.insert(claim.id.clone(), claim);
        }
        repo
    }

    /// Starts from the default claim set.
    pub fn seeded() -> Self {
        Self::with_claims(default_claims())
    }
}

impl Default for InMemoryClaimRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimRepository for InMemoryClaimRepository {
    async fn load(&self) -> Vec<Claim> {
        let mut claims: Vec<Claim> = self.claims.iter().map(|entry| entry.clone()).collect();
        claims.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        claims
    }

    async fn save(&self, claims: &[Claim]) {
        let keep: HashSet<&str> = claims.iter().map(|c| c.id.as_str()).collect();
        self.claims.retain(|id, _| keep.contains(id.as_str()));
        for claim in claims {
            self.claims.insert(claim.id.clone(), claim.clone());
        }
    }

    async fn upsert(&self, claim: Claim) {
        self.claims.insert(claim.id.clone(), claim);
    }

    async fn append_event(&self, claim_id: &str, event: TimelineEvent) {
        match self.claims.get_mut(claim_id) {
            Some(mut claim) => {
                append_once(&mut claim, event);
            }
            None => warn!(claim_id, "Dropping event for unknown claim"),
        }
    }

    async fn find(&self, claim_id: &str) -> Option<Claim> {
        self.claims.get(claim_id).map(|entry| entry.clone())
    }
}

/// Claims kept as one pretty-printed JSON array on disk.
///
/// Read-modify-write cycles within one process are serialised on a lock.
/// Other processes sharing the file can still overwrite each other.
pub struct JsonFileClaimRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileClaimRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, claims: &[Claim]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_string_pretty(claims)?;
        tokio::fs::write(&self.path, data).await
    }

    async fn persist(&self, claims: &[Claim]) {
        if let Err(e) = self.write(claims).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist claims");
        }
    }
}

#[async_trait]
impl ClaimRepository for JsonFileClaimRepository {
    async fn load(&self) -> Vec<Claim> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No claim store yet, using defaults");
                return default_claims();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read claim store, using defaults"
                );
                return default_claims();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt claim store, using defaults"
                );
                default_claims()
            }
        }
    }

    async fn save(&self, claims: &[Claim]) {
        let _guard = self.write_lock.lock().await;
        self.persist(claims).await;
    }

    async fn append_event(&self, claim_id: &str, event: TimelineEvent) {
        let _guard = self.write_lock.lock().await;
        let mut claims = self.load().await;
        let Some(claim) = claims.iter_mut().find(|c| c.id == claim_id) else {
            warn!(claim_id, "Dropping event for unknown claim");
            return;
        };
        if append_once(claim, event) {
            self.persist(&claims).await;
        }
    }

    async fn upsert(&self, claim: Claim) {
        let _guard = self.write_lock.lock().await;
        let mut claims = self.load().await;
        match claims.iter_mut().find(|c| c.id == claim.id) {
            Some(existing) => *existing = claim,
            None => claims.push(claim),
        }
        self.persist(&claims).await;
    }
}
