use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::deals::types::Company;
use crate::graph::provisioner::FolderProvisioner;
use crate::store::{DealStore, NewCompany};
use crate::workflows::WorkflowError;

/// Three letters followed by four digits, e.g. ACM0001.
static COMPANY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3}[0-9]{4}$").expect("company code pattern is valid"));

/// Input for onboarding a company. All three drive ids are required up front;
/// the base folder name is derived, never supplied.
#[derive(Debug, Clone)]
pub struct CompanyOnboarding {
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub sub_address: Option<String>,
    pub office_number: Option<String>,
    pub site_id: String,
    pub sales_drive_id: String,
    pub projects_drive_id: String,
    pub finance_drive_id: String,
}

/// Create the company record and materialize its base folder on the sales,
/// projects and finance drives.
///
/// The three base folders are provisioned concurrently; if one drive fails,
/// folders already created on the others stay in place (a later retry of the
/// same company re-resolves them idempotently).
pub async fn onboard_company(
    store: &dyn DealStore,
    provisioner: &FolderProvisioner,
    input: CompanyOnboarding,
) -> Result<Company, WorkflowError> {
    if !COMPANY_CODE.is_match(input.code.trim()) {
        return Err(WorkflowError::InvalidCompanyCode(input.code));
    }
    let code = input.code.trim().to_uppercase();
    let base_folder_name = format!("{} - {}", input.name, code);

    let company = store
        .create_company(NewCompany {
            name: input.name,
            code,
            address: input.address,
            sub_address: input.sub_address,
            office_number: input.office_number,
            site_id: Some(input.site_id),
            sales_drive_id: Some(input.sales_drive_id.clone()),
            projects_drive_id: Some(input.projects_drive_id.clone()),
            finance_drive_id: Some(input.finance_drive_id.clone()),
            base_folder_name: Some(base_folder_name.clone()),
        })
        .await?;

    let (sales, projects, finance) = tokio::join!(
        provisioner.ensure(&input.sales_drive_id, &base_folder_name),
        provisioner.ensure(&input.projects_drive_id, &base_folder_name),
        provisioner.ensure(&input.finance_drive_id, &base_folder_name),
    );
    sales?;
    projects?;
    finance?;

    info!(
        company = %company.id,
        code = %company.code,
        base_folder = %base_folder_name,
        "company onboarded with base folders on all three drives"
    );
    Ok(company)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_code_pattern() {
        assert!(COMPANY_CODE.is_match("ACM0001"));
        assert!(COMPANY_CODE.is_match("xyz9999"));
        assert!(!COMPANY_CODE.is_match("AC0001"));
        assert!(!COMPANY_CODE.is_match("ACME001"));
        assert!(!COMPANY_CODE.is_match("ACM001"));
        assert!(!COMPANY_CODE.is_match("ACM00012"));
    }
}
