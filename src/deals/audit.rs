use std::sync::Arc;

use tracing::debug;

use crate::deals::types::AuditEntry;
use crate::store::{DealStore, NewAuditEntry, StoreError};

/// Identity recorded when a caller supplies no actor.
pub const SYSTEM_ACTOR: &str = "system@deal-desk.local";

/// Appends immutable audit entries for lifecycle mutations.
///
/// A failed append fails the enclosing operation; entries are never updated
/// or deleted.
pub struct AuditRecorder {
    store: Arc<dyn DealStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn DealStore>) -> Self {
        Self { store }
    }

    /// Resolve the actor identity, falling back to the system identity for a
    /// missing or blank value. Never returns an empty string.
    pub fn resolve_actor(actor: Option<&str>) -> String {
        match actor {
            Some(upn) if !upn.trim().is_empty() => upn.trim().to_string(),
            _ => SYSTEM_ACTOR.to_string(),
        }
    }

    pub async fn record(
        &self,
        deal_id: &str,
        action: &str,
        actor: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<AuditEntry, StoreError> {
        let actor_upn = Self::resolve_actor(actor);
        debug!(deal = deal_id, action, actor = %actor_upn, "recording audit entry");
        self.store
            .append_audit(NewAuditEntry {
                deal_id: deal_id.to_string(),
                action: action.to_string(),
                actor_upn,
                payload,
            })
            .await
    }
}
