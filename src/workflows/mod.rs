pub mod deal_setup;
pub mod onboarding;
pub mod queries;

use thiserror::Error;

use crate::deals::state_machine::TransitionError;
use crate::graph::errors::GraphError;
use crate::store::StoreError;

pub use deal_setup::{
    add_participant, create_customer, create_deal, DealSetup, FINANCE_SUBFOLDERS,
    PROJECTS_SUBFOLDERS, SALES_SUBFOLDERS,
};
pub use onboarding::{onboard_company, CompanyOnboarding};
pub use queries::{company_summaries, deal_summaries, files_by_label, CompanySummary, DealSummary};

/// Failures surfaced by the higher-level workflows. Store and remote-storage
/// errors pass through as their own typed kinds.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid company code '{0}': expected three letters followed by four digits")]
    InvalidCompanyCode(String),

    #[error("company {0} not found")]
    CompanyNotFound(String),

    #[error("company {0} is missing its remote drive configuration")]
    MissingDriveConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
