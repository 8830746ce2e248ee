// deal-desk library - remote folder provisioning and deal lifecycle control
// This exposes the core components for testing and integration

pub mod config;
pub mod deals;
pub mod graph;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{config, init_config, DealDeskConfig, GraphConfig};
pub use deals::{
    AuditEntry, AuditRecorder, Company, Customer, Deal, DealStateMachine, DealStatus, DealType,
    FileLabel, FileLink, Participant, TransitionError, SYSTEM_ACTOR,
};
pub use graph::{
    ClientCredentials, DriveItem, FolderProvisioner, FolderRef, GraphClient, GraphError,
    StaticToken, TokenProvider,
};
pub use store::{DealStore, DealUpdate, MemoryStore, StoreError};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use telemetry::init_telemetry;
pub use workflows::{
    add_participant, company_summaries, create_customer, create_deal, deal_summaries,
    files_by_label, onboard_company, CompanyOnboarding, DealSetup, WorkflowError,
};
