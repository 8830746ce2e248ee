pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::deals::types::{
    AuditEntry, CommPref, Company, Customer, Deal, DealStatus, DealType, FileLabel, FileLink,
    Participant, ParticipantKind,
};

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation on the human-facing company code. Surfaced
    /// distinctly so callers can present a specific message.
    #[error("company code '{0}' already exists")]
    DuplicateCompanyCode(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Creation payload for a company record.
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub sub_address: Option<String>,
    pub office_number: Option<String>,
    pub site_id: Option<String>,
    pub sales_drive_id: Option<String>,
    pub projects_drive_id: Option<String>,
    pub finance_drive_id: Option<String>,
    pub base_folder_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub company_id: String,
    pub client_name: String,
    pub mobile_number: Option<String>,
    pub comm_pref: Option<CommPref>,
}

#[derive(Debug, Clone)]
pub struct NewDeal {
    pub company_id: String,
    pub customer_id: Option<String>,
    pub project_name: String,
    pub deal_type: DealType,
    pub status: DealStatus,
    pub owner_upn: String,
    pub estimated_size: Option<Decimal>,
    pub sales_item_id: Option<String>,
    pub web_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFileLink {
    pub label: FileLabel,
    pub drive_id: String,
    pub item_id: String,
    pub web_url: String,
}

#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub deal_id: String,
    pub kind: ParticipantKind,
    pub company_name: String,
    pub poc_name: Option<String>,
    pub poc_contact: Option<String>,
    pub poc_email: Option<String>,
    pub product_brand: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub deal_id: String,
    pub action: String,
    pub actor_upn: String,
    pub payload: serde_json::Value,
}

/// Field patch applied atomically to one deal; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct DealUpdate {
    pub status: Option<DealStatus>,
    pub deal_type: Option<DealType>,
    pub is_lost: Option<bool>,
    pub is_completed: Option<bool>,
    pub lost_reason: Option<String>,
    pub alt_opportunity: Option<String>,
    pub sales_item_id: Option<String>,
    pub web_url: Option<String>,
}

/// One row of a labeled file listing (lost deals excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub id: String,
    pub company: String,
    pub project: String,
    pub url: String,
}

/// Repository boundary for companies, deals and their sub-resources.
///
/// Implementations generate identifiers, enforce company-code uniqueness and
/// apply `update_deal` atomically with respect to concurrent updates of the
/// same deal. Audit entries are append-only; nothing is ever deleted.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn create_company(&self, new: NewCompany) -> Result<Company, StoreError>;
    async fn find_company(&self, id: &str) -> Result<Option<Company>, StoreError>;
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;

    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, StoreError>;

    /// Create a deal and its file links in one unit.
    async fn create_deal(
        &self,
        new: NewDeal,
        files: Vec<NewFileLink>,
    ) -> Result<Deal, StoreError>;
    async fn find_deal(&self, id: &str) -> Result<Option<Deal>, StoreError>;
    async fn list_deals(&self) -> Result<Vec<Deal>, StoreError>;
    async fn list_company_deals(&self, company_id: &str) -> Result<Vec<Deal>, StoreError>;
    async fn count_company_deals(&self, company_id: &str) -> Result<u64, StoreError>;
    async fn update_deal(&self, id: &str, update: DealUpdate) -> Result<Deal, StoreError>;

    async fn add_participant(&self, new: NewParticipant) -> Result<Participant, StoreError>;
    async fn list_deal_participants(
        &self,
        deal_id: &str,
    ) -> Result<Vec<Participant>, StoreError>;

    async fn list_deal_files(&self, deal_id: &str) -> Result<Vec<FileLink>, StoreError>;
    /// Labeled folder listing across deals, excluding lost deals, ordered by
    /// project name.
    async fn list_files_by_label(
        &self,
        label: FileLabel,
    ) -> Result<Vec<FileListing>, StoreError>;

    async fn append_audit(&self, new: NewAuditEntry) -> Result<AuditEntry, StoreError>;
    async fn list_audit(&self, deal_id: &str) -> Result<Vec<AuditEntry>, StoreError>;
}
