use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::deals::types::{
    AuditEntry, Company, Customer, Deal, FileLabel, FileLink, Participant,
};
use crate::store::{
    DealStore, DealUpdate, FileListing, NewAuditEntry, NewCompany, NewCustomer, NewDeal,
    NewFileLink, NewParticipant, StoreError,
};

/// In-process store backing tests and the default wiring.
///
/// A single mutex guards all tables, which makes every operation — including
/// the deal update — atomic with respect to concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    companies: HashMap<String, Company>,
    customers: HashMap<String, Customer>,
    deals: HashMap<String, Deal>,
    participants: Vec<Participant>,
    files: Vec<FileLink>,
    audit: Vec<AuditEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn create_company(&self, new: NewCompany) -> Result<Company, StoreError> {
        let mut tables = self.lock()?;

        let code = new.code.trim().to_uppercase();
        if tables
            .companies
            .values()
            .any(|company| company.code.eq_ignore_ascii_case(&code))
        {
            return Err(StoreError::DuplicateCompanyCode(code));
        }

        let company = Company {
            id: Self::generate_id(),
            name: new.name,
            code,
            address: new.address,
            sub_address: new.sub_address,
            office_number: new.office_number,
            site_id: new.site_id,
            sales_drive_id: new.sales_drive_id,
            projects_drive_id: new.projects_drive_id,
            finance_drive_id: new.finance_drive_id,
            base_folder_name: new.base_folder_name,
            created_at: Utc::now(),
        };
        tables.companies.insert(company.id.clone(), company.clone());
        Ok(company)
    }

    async fn find_company(&self, id: &str) -> Result<Option<Company>, StoreError> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let mut companies: Vec<Company> = self.lock()?.companies.values().cloned().collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(companies)
    }

    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        let mut tables = self.lock()?;
        if !tables.companies.contains_key(&new.company_id) {
            return Err(StoreError::NotFound {
                entity: "company",
                id: new.company_id,
            });
        }
        let customer = Customer {
            id: Self::generate_id(),
            company_id: new.company_id,
            client_name: new.client_name,
            mobile_number: new.mobile_number,
            comm_pref: new.comm_pref,
            created_at: Utc::now(),
        };
        tables.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn create_deal(
        &self,
        new: NewDeal,
        files: Vec<NewFileLink>,
    ) -> Result<Deal, StoreError> {
        let mut tables = self.lock()?;
        if !tables.companies.contains_key(&new.company_id) {
            return Err(StoreError::NotFound {
                entity: "company",
                id: new.company_id,
            });
        }

        let deal = Deal {
            id: Self::generate_id(),
            company_id: new.company_id,
            customer_id: new.customer_id,
            project_name: new.project_name,
            deal_type: new.deal_type,
            status: new.status,
            owner_upn: new.owner_upn,
            estimated_size: new.estimated_size,
            is_lost: false,
            is_completed: false,
            lost_reason: None,
            alt_opportunity: None,
            sales_item_id: new.sales_item_id,
            web_url: new.web_url,
            created_at: Utc::now(),
        };

        for file in files {
            tables.files.push(FileLink {
                id: Self::generate_id(),
                deal_id: deal.id.clone(),
                label: file.label,
                drive_id: file.drive_id,
                item_id: file.item_id,
                web_url: file.web_url,
            });
        }
        tables.deals.insert(deal.id.clone(), deal.clone());
        Ok(deal)
    }

    async fn find_deal(&self, id: &str) -> Result<Option<Deal>, StoreError> {
        Ok(self.lock()?.deals.get(id).cloned())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, StoreError> {
        let mut deals: Vec<Deal> = self.lock()?.deals.values().cloned().collect();
        deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deals)
    }

    async fn list_company_deals(&self, company_id: &str) -> Result<Vec<Deal>, StoreError> {
        let mut deals: Vec<Deal> = self
            .lock()?
            .deals
            .values()
            .filter(|deal| deal.company_id == company_id)
            .cloned()
            .collect();
        deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deals)
    }

    async fn count_company_deals(&self, company_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .deals
            .values()
            .filter(|deal| deal.company_id == company_id)
            .count() as u64)
    }

    async fn update_deal(&self, id: &str, update: DealUpdate) -> Result<Deal, StoreError> {
        let mut tables = self.lock()?;
        let deal = tables.deals.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "deal",
            id: id.to_string(),
        })?;

        if let Some(status) = update.status {
            deal.status = status;
        }
        if let Some(deal_type) = update.deal_type {
            deal.deal_type = deal_type;
        }
        if let Some(is_lost) = update.is_lost {
            deal.is_lost = is_lost;
        }
        if let Some(is_completed) = update.is_completed {
            deal.is_completed = is_completed;
        }
        if let Some(reason) = update.lost_reason {
            deal.lost_reason = Some(reason);
        }
        if let Some(alt) = update.alt_opportunity {
            deal.alt_opportunity = Some(alt);
        }
        if let Some(item_id) = update.sales_item_id {
            deal.sales_item_id = Some(item_id);
        }
        if let Some(url) = update.web_url {
            deal.web_url = Some(url);
        }

        Ok(deal.clone())
    }

    async fn add_participant(&self, new: NewParticipant) -> Result<Participant, StoreError> {
        let mut tables = self.lock()?;
        if !tables.deals.contains_key(&new.deal_id) {
            return Err(StoreError::NotFound {
                entity: "deal",
                id: new.deal_id,
            });
        }
        let participant = Participant {
            id: Self::generate_id(),
            deal_id: new.deal_id,
            kind: new.kind,
            company_name: new.company_name,
            poc_name: new.poc_name,
            poc_contact: new.poc_contact,
            poc_email: new.poc_email,
            product_brand: new.product_brand,
        };
        tables.participants.push(participant.clone());
        Ok(participant)
    }

    async fn list_deal_participants(
        &self,
        deal_id: &str,
    ) -> Result<Vec<Participant>, StoreError> {
        Ok(self
            .lock()?
            .participants
            .iter()
            .filter(|participant| participant.deal_id == deal_id)
            .cloned()
            .collect())
    }

    async fn list_deal_files(&self, deal_id: &str) -> Result<Vec<FileLink>, StoreError> {
        Ok(self
            .lock()?
            .files
            .iter()
            .filter(|file| file.deal_id == deal_id)
            .cloned()
            .collect())
    }

    async fn list_files_by_label(
        &self,
        label: FileLabel,
    ) -> Result<Vec<FileListing>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<FileListing> = tables
            .files
            .iter()
            .filter(|file| file.label == label)
            .filter_map(|file| {
                let deal = tables.deals.get(&file.deal_id)?;
                if deal.is_lost {
                    return None;
                }
                let company = tables.companies.get(&deal.company_id)?;
                Some(FileListing {
                    id: file.id.clone(),
                    company: company.name.clone(),
                    project: deal.project_name.clone(),
                    url: file.web_url.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(rows)
    }

    async fn append_audit(&self, new: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let mut tables = self.lock()?;
        if !tables.deals.contains_key(&new.deal_id) {
            return Err(StoreError::NotFound {
                entity: "deal",
                id: new.deal_id,
            });
        }
        let entry = AuditEntry {
            id: Self::generate_id(),
            deal_id: new.deal_id,
            action: new.action,
            actor_upn: new.actor_upn,
            payload: new.payload,
            created_at: Utc::now(),
        };
        tables.audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(&self, deal_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|entry| entry.deal_id == deal_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::types::{DealStatus, DealType};

    fn sample_company() -> NewCompany {
        NewCompany {
            name: "Acme Pte Ltd".to_string(),
            code: "ACM0001".to_string(),
            address: None,
            sub_address: None,
            office_number: None,
            site_id: Some("site-1".to_string()),
            sales_drive_id: Some("drive-sales".to_string()),
            projects_drive_id: Some("drive-projects".to_string()),
            finance_drive_id: Some("drive-finance".to_string()),
            base_folder_name: Some("Acme Pte Ltd - ACM0001".to_string()),
        }
    }

    #[tokio::test]
    async fn company_code_uniqueness_is_enforced() {
        let store = MemoryStore::new();
        store.create_company(sample_company()).await.unwrap();

        let mut duplicate = sample_company();
        duplicate.name = "Other Acme".to_string();
        duplicate.code = "acm0001".to_string();

        match store.create_company(duplicate).await {
            Err(StoreError::DuplicateCompanyCode(code)) => assert_eq!(code, "ACM0001"),
            other => panic!("expected duplicate-code error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deal_update_patches_only_named_fields() {
        let store = MemoryStore::new();
        let company = store.create_company(sample_company()).await.unwrap();
        let deal = store
            .create_deal(
                NewDeal {
                    company_id: company.id,
                    customer_id: None,
                    project_name: "Fitout".to_string(),
                    deal_type: DealType::NewOpportunity,
                    status: DealStatus::NotStarted,
                    owner_upn: "alex@acme.test".to_string(),
                    estimated_size: None,
                    sales_item_id: None,
                    web_url: None,
                },
                Vec::new(),
            )
            .await
            .unwrap();

        let updated = store
            .update_deal(
                &deal.id,
                DealUpdate {
                    status: Some(DealStatus::PendingToQuote),
                    sales_item_id: Some("item-base".to_string()),
                    web_url: Some("https://example.sharepoint.com/base".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, DealStatus::PendingToQuote);
        assert_eq!(updated.deal_type, DealType::NewOpportunity);
        assert_eq!(updated.sales_item_id.as_deref(), Some("item-base"));
        assert!(!updated.is_lost);
    }

    #[tokio::test]
    async fn label_listing_skips_lost_deals() {
        let store = MemoryStore::new();
        let company = store.create_company(sample_company()).await.unwrap();

        let make_deal = |name: &str| NewDeal {
            company_id: company.id.clone(),
            customer_id: None,
            project_name: name.to_string(),
            deal_type: DealType::NewOpportunity,
            status: DealStatus::NotStarted,
            owner_upn: "alex@acme.test".to_string(),
            estimated_size: None,
            sales_item_id: None,
            web_url: None,
        };
        let link = |n: u32| NewFileLink {
            label: FileLabel::Quotes,
            drive_id: "drive-sales".to_string(),
            item_id: format!("item-{n}"),
            web_url: format!("https://example.sharepoint.com/q{n}"),
        };

        let keep = store.create_deal(make_deal("A Project"), vec![link(1)]).await.unwrap();
        let lose = store.create_deal(make_deal("B Project"), vec![link(2)]).await.unwrap();
        store
            .update_deal(
                &lose.id,
                DealUpdate {
                    is_lost: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rows = store.list_files_by_label(FileLabel::Quotes).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project, "A Project");
        assert_eq!(rows[0].url, "https://example.sharepoint.com/q1");
        assert_eq!(keep.project_name, "A Project");
    }
}
