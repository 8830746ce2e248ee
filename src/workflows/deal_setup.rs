use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::info;

use crate::deals::types::{Customer, Deal, DealStatus, DealType, FileLabel, Participant};
use crate::graph::provisioner::FolderProvisioner;
use crate::store::{DealStore, NewCustomer, NewDeal, NewFileLink, NewParticipant};
use crate::workflows::WorkflowError;

/// Labeled sub-folders created on the sales drive for every deal.
pub const SALES_SUBFOLDERS: [FileLabel; 3] = [
    FileLabel::Quotes,
    FileLabel::PurchaseOrders,
    FileLabel::Agreements,
];

/// Labeled sub-folders created on the projects drive.
pub const PROJECTS_SUBFOLDERS: [FileLabel; 3] = [
    FileLabel::ServiceReports,
    FileLabel::HandoverReports,
    FileLabel::DeliveryOrders,
];

/// Labeled sub-folders created on the finance drive.
pub const FINANCE_SUBFOLDERS: [FileLabel; 3] = [
    FileLabel::Invoices,
    FileLabel::CreditNotes,
    FileLabel::Receipts,
];

/// Input for creating a deal with its folder tree.
#[derive(Debug, Clone)]
pub struct DealSetup {
    pub company_id: String,
    pub customer_id: Option<String>,
    pub project_name: String,
    pub deal_type: DealType,
    pub status: DealStatus,
    pub owner_upn: String,
    pub estimated_size: Option<Decimal>,
}

fn format_sequence(seq: u64) -> String {
    format!("{seq:04}")
}

/// Create a deal: provision its base folder and nine labeled sub-folders
/// across the company's three drives, then persist the deal with its file
/// links and sales folder reference.
///
/// The deal folder is named `"{seq:04} - {project_name}"` from the company's
/// current deal count. The nine sub-folder ensures run concurrently; each
/// targets a distinct path, and the shared base ancestor is walked redundantly
/// but idempotently. On partial failure the folders already created persist
/// and no deal record is written.
pub async fn create_deal(
    store: &dyn DealStore,
    provisioner: &FolderProvisioner,
    input: DealSetup,
) -> Result<Deal, WorkflowError> {
    let company = store
        .find_company(&input.company_id)
        .await?
        .ok_or_else(|| WorkflowError::CompanyNotFound(input.company_id.clone()))?;
    let drives = company
        .drive_config()
        .ok_or_else(|| WorkflowError::MissingDriveConfig(company.id.clone()))?;

    let deal_count = store.count_company_deals(&company.id).await?;
    let folder_name = format!("{} - {}", format_sequence(deal_count + 1), input.project_name);
    let base_path = format!("{}/{}", drives.base_folder_name, folder_name);

    let sales_base = provisioner
        .ensure_with_url(&drives.sales_drive_id, &base_path)
        .await?;

    let (sales, projects, finance) = tokio::join!(
        provision_labeled(provisioner, &drives.sales_drive_id, &base_path, &SALES_SUBFOLDERS),
        provision_labeled(
            provisioner,
            &drives.projects_drive_id,
            &base_path,
            &PROJECTS_SUBFOLDERS
        ),
        provision_labeled(
            provisioner,
            &drives.finance_drive_id,
            &base_path,
            &FINANCE_SUBFOLDERS
        ),
    );

    let mut files = sales?;
    files.extend(projects?);
    files.extend(finance?);

    let deal = store
        .create_deal(
            NewDeal {
                company_id: input.company_id,
                customer_id: input.customer_id,
                project_name: input.project_name,
                deal_type: input.deal_type,
                status: input.status,
                owner_upn: input.owner_upn,
                estimated_size: input.estimated_size,
                sales_item_id: Some(sales_base.item_id),
                web_url: Some(sales_base.web_url),
            },
            files,
        )
        .await?;

    info!(
        deal = %deal.id,
        company = %company.code,
        folder = %base_path,
        "deal created with provisioned folder tree"
    );
    Ok(deal)
}

/// Ensure one labeled sub-folder per label under `base_path`, concurrently.
async fn provision_labeled(
    provisioner: &FolderProvisioner,
    drive_id: &str,
    base_path: &str,
    labels: &[FileLabel],
) -> Result<Vec<NewFileLink>, WorkflowError> {
    let ensures = labels.iter().map(|label| async move {
        let path = format!("{}/{}", base_path, label.folder_name());
        let folder = provisioner.ensure_with_url(drive_id, &path).await?;
        Ok::<_, WorkflowError>(NewFileLink {
            label: *label,
            drive_id: folder.drive_id,
            item_id: folder.item_id,
            web_url: folder.web_url,
        })
    });
    join_all(ensures).await.into_iter().collect()
}

/// Attach a third party to an existing deal.
pub async fn add_participant(
    store: &dyn DealStore,
    new: NewParticipant,
) -> Result<Participant, WorkflowError> {
    Ok(store.add_participant(new).await?)
}

/// Register an end customer under a company.
pub async fn create_customer(
    store: &dyn DealStore,
    new: NewCustomer,
) -> Result<Customer, WorkflowError> {
    Ok(store.create_customer(new).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_zero_padded_to_four_digits() {
        assert_eq!(format_sequence(1), "0001");
        assert_eq!(format_sequence(42), "0042");
        assert_eq!(format_sequence(12345), "12345");
    }

    #[test]
    fn nine_labels_cover_three_drives() {
        let mut all: Vec<FileLabel> = Vec::new();
        all.extend(SALES_SUBFOLDERS);
        all.extend(PROJECTS_SUBFOLDERS);
        all.extend(FINANCE_SUBFOLDERS);
        assert_eq!(all.len(), 9);
        all.sort_by_key(|label| label.as_str());
        all.dedup();
        assert_eq!(all.len(), 9);
    }
}
