use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::deals::types::{DealStatus, DealType, FileLabel};
use crate::graph::provisioner::FolderProvisioner;
use crate::store::{DealStore, FileListing};
use crate::workflows::WorkflowError;

/// One deal with the company, participant and file-link context the deal
/// board renders.
#[derive(Debug, Clone, Serialize)]
pub struct DealSummary {
    pub id: String,
    pub project_name: String,
    pub status: DealStatus,
    pub deal_type: DealType,
    pub is_lost: bool,
    pub is_completed: bool,
    pub estimated_size: Option<Decimal>,
    pub company_id: String,
    pub company_name: String,
    pub participants: Vec<String>,
    pub files: Vec<DealFileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DealFileSummary {
    pub label: FileLabel,
    pub web_url: String,
}

/// Per-company deal tallies plus resolved base-folder URLs.
#[derive(Debug, Clone, Serialize)]
pub struct CompanySummary {
    pub id: String,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub active_deals: usize,
    pub confirmed_deals: usize,
    pub completed_deals: usize,
    pub lost_deals: usize,
    pub sales_url: Option<String>,
    pub projects_url: Option<String>,
    pub finance_url: Option<String>,
}

/// Newest-first deal listing with joined context.
pub async fn deal_summaries(store: &dyn DealStore) -> Result<Vec<DealSummary>, WorkflowError> {
    let deals = store.list_deals().await?;
    let mut summaries = Vec::with_capacity(deals.len());

    for deal in deals {
        let company = store
            .find_company(&deal.company_id)
            .await?
            .ok_or_else(|| WorkflowError::CompanyNotFound(deal.company_id.clone()))?;
        let participants = store
            .list_deal_participants(&deal.id)
            .await?
            .into_iter()
            .map(|participant| participant.company_name)
            .collect();
        let files = store
            .list_deal_files(&deal.id)
            .await?
            .into_iter()
            .map(|file| DealFileSummary {
                label: file.label,
                web_url: file.web_url,
            })
            .collect();

        summaries.push(DealSummary {
            id: deal.id,
            project_name: deal.project_name,
            status: deal.status,
            deal_type: deal.deal_type,
            is_lost: deal.is_lost,
            is_completed: deal.is_completed,
            estimated_size: deal.estimated_size,
            company_id: company.id,
            company_name: company.name,
            participants,
            files,
        });
    }

    Ok(summaries)
}

/// Company listing with deal tallies and the base-folder URL per drive.
///
/// URL resolution is best effort here: a drive that cannot be resolved logs a
/// warning and yields `None` instead of failing the whole listing.
pub async fn company_summaries(
    store: &dyn DealStore,
    provisioner: &FolderProvisioner,
) -> Result<Vec<CompanySummary>, WorkflowError> {
    let companies = store.list_companies().await?;
    let mut summaries = Vec::with_capacity(companies.len());

    for company in companies {
        let deals = store.list_company_deals(&company.id).await?;
        let active_deals = deals
            .iter()
            .filter(|deal| !deal.is_lost && !deal.is_completed)
            .count();
        let confirmed_deals = deals
            .iter()
            .filter(|deal| !deal.is_lost && deal.deal_type == DealType::Confirmed)
            .count();
        let completed_deals = deals.iter().filter(|deal| deal.is_completed).count();
        let lost_deals = deals.iter().filter(|deal| deal.is_lost).count();

        let (sales_url, projects_url, finance_url) = tokio::join!(
            resolve_base_url(
                provisioner,
                company.sales_drive_id.as_deref(),
                company.base_folder_name.as_deref()
            ),
            resolve_base_url(
                provisioner,
                company.projects_drive_id.as_deref(),
                company.base_folder_name.as_deref()
            ),
            resolve_base_url(
                provisioner,
                company.finance_drive_id.as_deref(),
                company.base_folder_name.as_deref()
            ),
        );

        let address = [
            company.address.as_deref(),
            company.sub_address.as_deref(),
            company.office_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        summaries.push(CompanySummary {
            id: company.id,
            name: company.name,
            code: company.code,
            address: if address.is_empty() { None } else { Some(address) },
            active_deals,
            confirmed_deals,
            completed_deals,
            lost_deals,
            sales_url,
            projects_url,
            finance_url,
        });
    }

    Ok(summaries)
}

async fn resolve_base_url(
    provisioner: &FolderProvisioner,
    drive_id: Option<&str>,
    base_path: Option<&str>,
) -> Option<String> {
    let (drive_id, base_path) = match (drive_id, base_path) {
        (Some(drive), Some(base)) if !drive.is_empty() && !base.is_empty() => (drive, base),
        _ => return None,
    };

    match provisioner.ensure_with_url(drive_id, base_path).await {
        Ok(folder) => Some(folder.web_url),
        Err(error) => {
            warn!(drive = drive_id, path = base_path, %error, "failed to resolve base folder URL");
            None
        }
    }
}

/// Labeled folder listing across all non-lost deals.
pub async fn files_by_label(
    store: &dyn DealStore,
    label: FileLabel,
) -> Result<Vec<FileListing>, WorkflowError> {
    Ok(store.list_files_by_label(label).await?)
}
