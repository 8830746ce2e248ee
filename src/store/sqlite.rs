use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{migrate::MigrateDatabase, sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::deals::types::{
    AuditEntry, CommPref, Company, Customer, Deal, DealStatus, DealType, FileLabel, FileLink,
    Participant, ParticipantKind,
};
use crate::store::{
    DealStore, DealUpdate, FileListing, NewAuditEntry, NewCompany, NewCustomer, NewDeal,
    NewFileLink, NewParticipant, StoreError,
};

/// SQLite-backed store for persistent deployments.
///
/// Timestamps are stored as RFC3339 text, decimals as canonical text, enums
/// by their wire names. Deal updates and deal+file-link creation run inside
/// transactions.
pub struct SqliteStore {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        address TEXT,
        sub_address TEXT,
        office_number TEXT,
        site_id TEXT,
        sales_drive_id TEXT,
        projects_drive_id TEXT,
        finance_drive_id TEXT,
        base_folder_name TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies(id),
        client_name TEXT NOT NULL,
        mobile_number TEXT,
        comm_pref TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deals (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies(id),
        customer_id TEXT,
        project_name TEXT NOT NULL,
        deal_type TEXT NOT NULL,
        status TEXT NOT NULL,
        owner_upn TEXT NOT NULL,
        estimated_size TEXT,
        is_lost INTEGER NOT NULL DEFAULT 0,
        is_completed INTEGER NOT NULL DEFAULT 0,
        lost_reason TEXT,
        alt_opportunity TEXT,
        sales_item_id TEXT,
        web_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS file_links (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        label TEXT NOT NULL,
        drive_id TEXT NOT NULL,
        item_id TEXT NOT NULL,
        web_url TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS participants (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        kind TEXT NOT NULL,
        company_name TEXT NOT NULL,
        poc_name TEXT,
        poc_contact TEXT,
        poc_email TEXT,
        product_brand TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        action TEXT NOT NULL,
        actor_upn TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

impl SqliteStore {
    /// Connect (creating the database if needed) and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await? {
            info!(url = database_url, "creating database");
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StoreError::Backend(format!("invalid stored timestamp '{raw}': {e}")))
    }

    fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
        raw.parse::<T>().map_err(StoreError::Backend)
    }

    fn company_from_row(row: &SqliteRow) -> Result<Company, StoreError> {
        Ok(Company {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            address: row.try_get("address")?,
            sub_address: row.try_get("sub_address")?,
            office_number: row.try_get("office_number")?,
            site_id: row.try_get("site_id")?,
            sales_drive_id: row.try_get("sales_drive_id")?,
            projects_drive_id: row.try_get("projects_drive_id")?,
            finance_drive_id: row.try_get("finance_drive_id")?,
            base_folder_name: row.try_get("base_folder_name")?,
            created_at: Self::parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        })
    }

    fn deal_from_row(row: &SqliteRow) -> Result<Deal, StoreError> {
        let estimated_size = row
            .try_get::<Option<String>, _>("estimated_size")?
            .map(|raw| {
                Decimal::from_str(&raw).map_err(|e| {
                    StoreError::Backend(format!("invalid stored decimal '{raw}': {e}"))
                })
            })
            .transpose()?;

        Ok(Deal {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            customer_id: row.try_get("customer_id")?,
            project_name: row.try_get("project_name")?,
            deal_type: Self::parse_enum::<DealType>(&row.try_get::<String, _>("deal_type")?)?,
            status: Self::parse_enum::<DealStatus>(&row.try_get::<String, _>("status")?)?,
            owner_upn: row.try_get("owner_upn")?,
            estimated_size,
            is_lost: row.try_get::<i64, _>("is_lost")? != 0,
            is_completed: row.try_get::<i64, _>("is_completed")? != 0,
            lost_reason: row.try_get("lost_reason")?,
            alt_opportunity: row.try_get("alt_opportunity")?,
            sales_item_id: row.try_get("sales_item_id")?,
            web_url: row.try_get("web_url")?,
            created_at: Self::parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        })
    }

    fn file_from_row(row: &SqliteRow) -> Result<FileLink, StoreError> {
        Ok(FileLink {
            id: row.try_get("id")?,
            deal_id: row.try_get("deal_id")?,
            label: Self::parse_enum::<FileLabel>(&row.try_get::<String, _>("label")?)?,
            drive_id: row.try_get("drive_id")?,
            item_id: row.try_get("item_id")?,
            web_url: row.try_get("web_url")?,
        })
    }

    fn participant_from_row(row: &SqliteRow) -> Result<Participant, StoreError> {
        Ok(Participant {
            id: row.try_get("id")?,
            deal_id: row.try_get("deal_id")?,
            kind: Self::parse_enum::<ParticipantKind>(&row.try_get::<String, _>("kind")?)?,
            company_name: row.try_get("company_name")?,
            poc_name: row.try_get("poc_name")?,
            poc_contact: row.try_get("poc_contact")?,
            poc_email: row.try_get("poc_email")?,
            product_brand: row.try_get("product_brand")?,
        })
    }

    fn audit_from_row(row: &SqliteRow) -> Result<AuditEntry, StoreError> {
        let payload_raw: String = row.try_get("payload")?;
        let payload = serde_json::from_str(&payload_raw)
            .map_err(|e| StoreError::Backend(format!("invalid stored audit payload: {e}")))?;
        Ok(AuditEntry {
            id: row.try_get("id")?,
            deal_id: row.try_get("deal_id")?,
            action: row.try_get("action")?,
            actor_upn: row.try_get("actor_upn")?,
            payload,
            created_at: Self::parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        })
    }

    fn map_company_insert_error(err: sqlx::Error, code: &str) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.message().contains("UNIQUE constraint failed: companies.code") {
                return StoreError::DuplicateCompanyCode(code.to_string());
            }
        }
        err.into()
    }
}

#[async_trait]
impl DealStore for SqliteStore {
    async fn create_company(&self, new: NewCompany) -> Result<Company, StoreError> {
        let id = Self::generate_id();
        let code = new.code.trim().to_uppercase();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO companies (
                id, name, code, address, sub_address, office_number, site_id,
                sales_drive_id, projects_drive_id, finance_drive_id,
                base_folder_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&code)
        .bind(&new.address)
        .bind(&new.sub_address)
        .bind(&new.office_number)
        .bind(&new.site_id)
        .bind(&new.sales_drive_id)
        .bind(&new.projects_drive_id)
        .bind(&new.finance_drive_id)
        .bind(&new.base_folder_name)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_company_insert_error(e, &code))?;

        Ok(Company {
            id,
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
            created_at,
        })
    }

    async fn find_company(&self, id: &str) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query("SELECT * FROM companies WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::company_from_row).transpose()
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query("SELECT * FROM companies ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::company_from_row).collect()
    }

    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        if self.find_company(&new.company_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "company",
                id: new.company_id,
            });
        }

        let id = Self::generate_id();
        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO customers (id, company_id, client_name, mobile_number, comm_pref, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&new.company_id)
        .bind(&new.client_name)
        .bind(&new.mobile_number)
        .bind(new.comm_pref.map(CommPref::as_str))
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Customer {
            id,
            company_id: new.company_id,
            client_name: new.client_name,
            mobile_number: new.mobile_number,
            comm_pref: new.comm_pref,
            created_at,
        })
    }

    async fn create_deal(
        &self,
        new: NewDeal,
        files: Vec<NewFileLink>,
    ) -> Result<Deal, StoreError> {
        if self.find_company(&new.company_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "company",
                id: new.company_id,
            });
        }

        let id = Self::generate_id();
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO deals (
                id, company_id, customer_id, project_name, deal_type, status,
                owner_upn, estimated_size, is_lost, is_completed, lost_reason,
                alt_opportunity, sales_item_id, web_url, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, NULL, NULL, ?9, ?10, ?11)
            "#,
        )
        .bind(&id)
        .bind(&new.company_id)
        .bind(&new.customer_id)
        .bind(&new.project_name)
        .bind(new.deal_type.as_str())
        .bind(new.status.as_str())
        .bind(&new.owner_upn)
        .bind(new.estimated_size.map(|size| size.to_string()))
        .bind(&new.sales_item_id)
        .bind(&new.web_url)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for file in &files {
            sqlx::query(
                r#"
                INSERT INTO file_links (id, deal_id, label, drive_id, item_id, web_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Self::generate_id())
            .bind(&id)
            .bind(file.label.as_str())
            .bind(&file.drive_id)
            .bind(&file.item_id)
            .bind(&file.web_url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Deal {
            id,
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
            created_at,
        })
    }

    async fn find_deal(&self, id: &str) -> Result<Option<Deal>, StoreError> {
        let row = sqlx::query("SELECT * FROM deals WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::deal_from_row).transpose()
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, StoreError> {
        let rows = sqlx::query("SELECT * FROM deals ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::deal_from_row).collect()
    }

    async fn list_company_deals(&self, company_id: &str) -> Result<Vec<Deal>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM deals WHERE company_id = ?1 ORDER BY created_at DESC")
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(Self::deal_from_row).collect()
    }

    async fn count_company_deals(&self, company_id: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM deals WHERE company_id = ?1")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn update_deal(&self, id: &str, update: DealUpdate) -> Result<Deal, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM deals WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "deal",
                id: id.to_string(),
            })?;
        let mut deal = Self::deal_from_row(&row)?;

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

        sqlx::query(
            r#"
            UPDATE deals SET
                deal_type = ?1, status = ?2, is_lost = ?3, is_completed = ?4,
                lost_reason = ?5, alt_opportunity = ?6, sales_item_id = ?7, web_url = ?8
            WHERE id = ?9
            "#,
        )
        .bind(deal.deal_type.as_str())
        .bind(deal.status.as_str())
        .bind(deal.is_lost as i64)
        .bind(deal.is_completed as i64)
        .bind(&deal.lost_reason)
        .bind(&deal.alt_opportunity)
        .bind(&deal.sales_item_id)
        .bind(&deal.web_url)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(deal)
    }

    async fn add_participant(&self, new: NewParticipant) -> Result<Participant, StoreError> {
        if self.find_deal(&new.deal_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "deal",
                id: new.deal_id,
            });
        }

        let id = Self::generate_id();
        sqlx::query(
            r#"
            INSERT INTO participants (
                id, deal_id, kind, company_name, poc_name, poc_contact, poc_email, product_brand
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.deal_id)
        .bind(new.kind.as_str())
        .bind(&new.company_name)
        .bind(&new.poc_name)
        .bind(&new.poc_contact)
        .bind(&new.poc_email)
        .bind(&new.product_brand)
        .execute(&self.pool)
        .await?;

        Ok(Participant {
            id,
            deal_id: new.deal_id,
            kind: new.kind,
            company_name: new.company_name,
            poc_name: new.poc_name,
            poc_contact: new.poc_contact,
            poc_email: new.poc_email,
            product_brand: new.product_brand,
        })
    }

    async fn list_deal_participants(
        &self,
        deal_id: &str,
    ) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query("SELECT * FROM participants WHERE deal_id = ?1")
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::participant_from_row).collect()
    }

    async fn list_deal_files(&self, deal_id: &str) -> Result<Vec<FileLink>, StoreError> {
        let rows = sqlx::query("SELECT * FROM file_links WHERE deal_id = ?1")
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::file_from_row).collect()
    }

    async fn list_files_by_label(
        &self,
        label: FileLabel,
    ) -> Result<Vec<FileListing>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.id AS id, c.name AS company, d.project_name AS project, f.web_url AS url
            FROM file_links f
            JOIN deals d ON d.id = f.deal_id
            JOIN companies c ON c.id = d.company_id
            WHERE f.label = ?1 AND d.is_lost = 0
            ORDER BY d.project_name ASC
            "#,
        )
        .bind(label.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FileListing {
                    id: row.try_get("id")?,
                    company: row.try_get("company")?,
                    project: row.try_get("project")?,
                    url: row.try_get("url")?,
                })
            })
            .collect()
    }

    async fn append_audit(&self, new: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        if self.find_deal(&new.deal_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "deal",
                id: new.deal_id,
            });
        }

        let id = Self::generate_id();
        let created_at = Utc::now();
        let payload_raw = serde_json::to_string(&new.payload)
            .map_err(|e| StoreError::Backend(format!("unserializable audit payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (id, deal_id, action, actor_upn, payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&new.deal_id)
        .bind(&new.action)
        .bind(&new.actor_upn)
        .bind(&payload_raw)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuditEntry {
            id,
            deal_id: new.deal_id,
            action: new.action,
            actor_upn: new.actor_upn,
            payload: new.payload,
            created_at,
        })
    }

    async fn list_audit(&self, deal_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE deal_id = ?1 ORDER BY created_at ASC")
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::audit_from_row).collect()
    }
}
