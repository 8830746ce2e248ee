use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::deals::audit::AuditRecorder;
use crate::deals::types::{Deal, DealStatus, DealType};
use crate::store::{DealStore, DealUpdate, StoreError};

/// Guard violations and failures for lifecycle operations. Every variant is a
/// rejected request; none is ever retried internally.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("deal {0} not found")]
    DealNotFound(String),

    #[error("cannot {action} a lost deal")]
    DealLost { action: &'static str },

    #[error("cannot {action} a completed deal")]
    DealCompleted { action: &'static str },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: DealStatus, to: DealStatus },

    #[error("lost reason cannot be empty")]
    EmptyLostReason,

    #[error("deal is already marked as lost")]
    AlreadyLost,

    #[error("deal must be CONFIRMED before completion")]
    NotConfirmed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates and applies deal lifecycle transitions.
///
/// Guard checks and the write are serialized per deal id, so two racing
/// operations on the same deal observe each other's effects; operations on
/// different deals never contend. Every successful mutation appends exactly
/// one audit entry in the same logical operation (the completed no-op appends
/// none), and an audit failure fails the operation.
pub struct DealStateMachine {
    store: Arc<dyn DealStore>,
    audit: AuditRecorder,
    deal_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DealStateMachine {
    pub fn new(store: Arc<dyn DealStore>) -> Self {
        Self {
            audit: AuditRecorder::new(store.clone()),
            store,
            deal_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Advance the deal to the immediate successor of its current status.
    pub async fn advance(
        &self,
        deal_id: &str,
        next_status: DealStatus,
        actor: Option<&str>,
    ) -> Result<Deal, TransitionError> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().await;

        let deal = self.load(deal_id).await?;
        if deal.is_lost {
            return Err(TransitionError::DealLost { action: "advance" });
        }
        if deal.is_completed {
            return Err(TransitionError::DealCompleted { action: "advance" });
        }
        if deal.status.successor() != Some(next_status) {
            return Err(TransitionError::InvalidTransition {
                from: deal.status,
                to: next_status,
            });
        }

        let updated = self
            .store
            .update_deal(
                deal_id,
                DealUpdate {
                    status: Some(next_status),
                    ..Default::default()
                },
            )
            .await?;

        self.audit
            .record(
                deal_id,
                "advance_status",
                actor,
                json!({
                    "previous_status": deal.status,
                    "next_status": next_status,
                }),
            )
            .await?;

        info!(deal = deal_id, from = %deal.status, to = %next_status, "deal status advanced");
        Ok(updated)
    }

    /// Mark the deal CONFIRMED, fast-forwarding status to
    /// `WaitingForConfirmation` when it currently sits earlier. Re-applying
    /// to an already confirmed deal is harmless and re-audited.
    pub async fn confirm(
        &self,
        deal_id: &str,
        actor: Option<&str>,
    ) -> Result<Deal, TransitionError> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().await;

        let deal = self.load(deal_id).await?;
        if deal.is_lost {
            return Err(TransitionError::DealLost { action: "confirm" });
        }

        let mut update = DealUpdate {
            deal_type: Some(DealType::Confirmed),
            ..Default::default()
        };
        // A confirmed deal never sits earlier than WAITING_FOR_CONFIRMATION;
        // a completed deal's status stays frozen.
        let fast_forward = !deal.is_completed
            && deal.status.position() < DealStatus::WaitingForConfirmation.position();
        if fast_forward {
            update.status = Some(DealStatus::WaitingForConfirmation);
        }
        let new_status = if fast_forward {
            DealStatus::WaitingForConfirmation
        } else {
            deal.status
        };

        let updated = self.store.update_deal(deal_id, update).await?;

        self.audit
            .record(
                deal_id,
                "set_type_confirmed",
                actor,
                json!({
                    "previous_type": deal.deal_type,
                    "previous_status": deal.status,
                    "new_type": DealType::Confirmed,
                    "new_status": new_status,
                }),
            )
            .await?;

        info!(deal = deal_id, status = %new_status, "deal confirmed");
        Ok(updated)
    }

    /// Mark the deal lost. Terminal and one-way; requires a non-blank reason.
    pub async fn mark_lost(
        &self,
        deal_id: &str,
        reason: &str,
        alt_opportunity: Option<&str>,
        actor: Option<&str>,
    ) -> Result<Deal, TransitionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionError::EmptyLostReason);
        }

        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().await;

        let deal = self.load(deal_id).await?;
        if deal.is_lost {
            return Err(TransitionError::AlreadyLost);
        }
        if deal.is_completed {
            return Err(TransitionError::DealCompleted { action: "lose" });
        }

        let updated = self
            .store
            .update_deal(
                deal_id,
                DealUpdate {
                    is_lost: Some(true),
                    is_completed: Some(false),
                    lost_reason: Some(reason.to_string()),
                    alt_opportunity: alt_opportunity.map(str::to_string),
                    ..Default::default()
                },
            )
            .await?;

        self.audit
            .record(
                deal_id,
                "set_lost",
                actor,
                json!({
                    "reason": reason,
                    "alt_opportunity": alt_opportunity,
                }),
            )
            .await?;

        info!(deal = deal_id, reason, "deal marked lost");
        Ok(updated)
    }

    /// Mark a confirmed deal completed. Calling it again on a completed deal
    /// succeeds as a no-op and appends no further audit entry.
    pub async fn mark_completed(
        &self,
        deal_id: &str,
        actor: Option<&str>,
    ) -> Result<Deal, TransitionError> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().await;

        let deal = self.load(deal_id).await?;
        if deal.is_lost {
            return Err(TransitionError::DealLost { action: "complete" });
        }
        if deal.deal_type != DealType::Confirmed {
            return Err(TransitionError::NotConfirmed);
        }
        if deal.is_completed {
            return Ok(deal);
        }

        let updated = self
            .store
            .update_deal(
                deal_id,
                DealUpdate {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        self.audit
            .record(deal_id, "set_completed", actor, json!({}))
            .await?;

        info!(deal = deal_id, "deal marked completed");
        Ok(updated)
    }

    async fn load(&self, deal_id: &str) -> Result<Deal, TransitionError> {
        self.store
            .find_deal(deal_id)
            .await?
            .ok_or_else(|| TransitionError::DealNotFound(deal_id.to_string()))
    }

    fn deal_lock(&self, deal_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, TransitionError> {
        let mut locks = self
            .deal_locks
            .lock()
            .map_err(|_| StoreError::Backend("deal lock table poisoned".to_string()))?;
        Ok(locks
            .entry(deal_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewCompany, NewDeal};

    async fn seeded_machine(status: DealStatus, deal_type: DealType) -> (DealStateMachine, String) {
        let store = Arc::new(MemoryStore::new());
        let company = store
            .create_company(NewCompany {
                name: "Acme Pte Ltd".to_string(),
                code: "ACM0001".to_string(),
                address: None,
                sub_address: None,
                office_number: None,
                site_id: None,
                sales_drive_id: None,
                projects_drive_id: None,
                finance_drive_id: None,
                base_folder_name: None,
            })
            .await
            .unwrap();
        let deal = store
            .create_deal(
                NewDeal {
                    company_id: company.id,
                    customer_id: None,
                    project_name: "Fitout".to_string(),
                    deal_type,
                    status,
                    owner_upn: "alex@acme.test".to_string(),
                    estimated_size: None,
                    sales_item_id: None,
                    web_url: None,
                },
                Vec::new(),
            )
            .await
            .unwrap();
        (DealStateMachine::new(store), deal.id)
    }

    #[tokio::test]
    async fn advance_accepts_only_the_immediate_successor() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::NotStarted, DealType::NewOpportunity).await;

        let skipped = machine
            .advance(&deal_id, DealStatus::PendingVendorQuote, None)
            .await;
        assert!(matches!(
            skipped,
            Err(TransitionError::InvalidTransition {
                from: DealStatus::NotStarted,
                to: DealStatus::PendingVendorQuote,
            })
        ));

        let advanced = machine
            .advance(&deal_id, DealStatus::PendingToQuote, None)
            .await
            .unwrap();
        assert_eq!(advanced.status, DealStatus::PendingToQuote);
    }

    #[tokio::test]
    async fn confirm_fast_forwards_an_early_deal() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::NotStarted, DealType::NewOpportunity).await;

        let confirmed = machine.confirm(&deal_id, Some("jo@acme.test")).await.unwrap();
        assert_eq!(confirmed.deal_type, DealType::Confirmed);
        assert_eq!(confirmed.status, DealStatus::WaitingForConfirmation);
    }

    #[tokio::test]
    async fn confirm_leaves_a_late_status_alone() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::InPreSalesStage, DealType::NewOpportunity).await;

        let confirmed = machine.confirm(&deal_id, None).await.unwrap();
        assert_eq!(confirmed.status, DealStatus::InPreSalesStage);
        assert_eq!(confirmed.deal_type, DealType::Confirmed);
    }

    #[tokio::test]
    async fn lost_deals_reject_every_operation() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::PendingToQuote, DealType::Confirmed).await;

        machine
            .mark_lost(&deal_id, "went with competitor", None, None)
            .await
            .unwrap();

        assert!(matches!(
            machine
                .advance(&deal_id, DealStatus::PendingVendorQuote, None)
                .await,
            Err(TransitionError::DealLost { .. })
        ));
        assert!(matches!(
            machine.confirm(&deal_id, None).await,
            Err(TransitionError::DealLost { .. })
        ));
        assert!(matches!(
            machine.mark_completed(&deal_id, None).await,
            Err(TransitionError::DealLost { .. })
        ));
        assert!(matches!(
            machine.mark_lost(&deal_id, "again", None, None).await,
            Err(TransitionError::AlreadyLost)
        ));
    }

    #[tokio::test]
    async fn blank_lost_reason_is_rejected() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::NotStarted, DealType::NewOpportunity).await;

        assert!(matches!(
            machine.mark_lost(&deal_id, "", None, None).await,
            Err(TransitionError::EmptyLostReason)
        ));
        assert!(matches!(
            machine.mark_lost(&deal_id, "   ", None, None).await,
            Err(TransitionError::EmptyLostReason)
        ));
    }

    #[tokio::test]
    async fn completion_requires_confirmed_type() {
        let (machine, deal_id) =
            seeded_machine(DealStatus::WaitingForConfirmation, DealType::Upcoming).await;

        assert!(matches!(
            machine.mark_completed(&deal_id, None).await,
            Err(TransitionError::NotConfirmed)
        ));
    }
}
