use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ordered lifecycle stages for a deal. `advance` only ever moves one step
/// to the right; `confirm` may fast-forward to `WaitingForConfirmation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    NotStarted,
    PendingToQuote,
    PendingVendorQuote,
    WaitingForPo,
    WaitingForConfirmation,
    InPreSalesStage,
}

impl DealStatus {
    pub const ORDER: [DealStatus; 6] = [
        DealStatus::NotStarted,
        DealStatus::PendingToQuote,
        DealStatus::PendingVendorQuote,
        DealStatus::WaitingForPo,
        DealStatus::WaitingForConfirmation,
        DealStatus::InPreSalesStage,
    ];

    /// Index within the fixed stage order.
    pub fn position(self) -> usize {
        match self {
            DealStatus::NotStarted => 0,
            DealStatus::PendingToQuote => 1,
            DealStatus::PendingVendorQuote => 2,
            DealStatus::WaitingForPo => 3,
            DealStatus::WaitingForConfirmation => 4,
            DealStatus::InPreSalesStage => 5,
        }
    }

    /// The only status `advance` accepts from this one.
    pub fn successor(self) -> Option<DealStatus> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealStatus::NotStarted => "NOT_STARTED",
            DealStatus::PendingToQuote => "PENDING_TO_QUOTE",
            DealStatus::PendingVendorQuote => "PENDING_VENDOR_QUOTE",
            DealStatus::WaitingForPo => "WAITING_FOR_PO",
            DealStatus::WaitingForConfirmation => "WAITING_FOR_CONFIRMATION",
            DealStatus::InPreSalesStage => "IN_PRE_SALES_STAGE",
        }
    }
}

impl std::str::FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown deal status '{s}'"))
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deal classification; independent axis from status. `Confirmed` is the
/// gate for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealType {
    NewOpportunity,
    Confirmed,
    ThirdQuote,
    Upcoming,
}

impl DealType {
    pub fn as_str(self) -> &'static str {
        match self {
            DealType::NewOpportunity => "NEW_OPPORTUNITY",
            DealType::Confirmed => "CONFIRMED",
            DealType::ThirdQuote => "THIRD_QUOTE",
            DealType::Upcoming => "UPCOMING",
        }
    }
}

impl std::str::FromStr for DealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            DealType::NewOpportunity,
            DealType::Confirmed,
            DealType::ThirdQuote,
            DealType::Upcoming,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or_else(|| format!("unknown deal type '{s}'"))
    }
}

impl std::fmt::Display for DealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic label for a deal's provisioned sub-folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileLabel {
    Quotes,
    PurchaseOrders,
    Agreements,
    ServiceReports,
    HandoverReports,
    DeliveryOrders,
    Invoices,
    CreditNotes,
    Receipts,
}

impl FileLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            FileLabel::Quotes => "QUOTES",
            FileLabel::PurchaseOrders => "PURCHASE_ORDERS",
            FileLabel::Agreements => "AGREEMENTS",
            FileLabel::ServiceReports => "SERVICE_REPORTS",
            FileLabel::HandoverReports => "HANDOVER_REPORTS",
            FileLabel::DeliveryOrders => "DELIVERY_ORDERS",
            FileLabel::Invoices => "INVOICES",
            FileLabel::CreditNotes => "CREDIT_NOTES",
            FileLabel::Receipts => "RECEIPTS",
        }
    }

    /// Display name of the remote folder carrying this label.
    pub fn folder_name(self) -> &'static str {
        match self {
            FileLabel::Quotes => "Quotes",
            FileLabel::PurchaseOrders => "Purchase Orders",
            FileLabel::Agreements => "Agreements",
            FileLabel::ServiceReports => "Service Reports",
            FileLabel::HandoverReports => "Handover Reports",
            FileLabel::DeliveryOrders => "Delivery Orders",
            FileLabel::Invoices => "Invoices",
            FileLabel::CreditNotes => "Credit Notes",
            FileLabel::Receipts => "Receipts",
        }
    }
}

impl std::str::FromStr for FileLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            FileLabel::Quotes,
            FileLabel::PurchaseOrders,
            FileLabel::Agreements,
            FileLabel::ServiceReports,
            FileLabel::HandoverReports,
            FileLabel::DeliveryOrders,
            FileLabel::Invoices,
            FileLabel::CreditNotes,
            FileLabel::Receipts,
        ]
        .into_iter()
        .find(|label| label.as_str() == s)
        .ok_or_else(|| format!("unknown file label '{s}'"))
    }
}

impl std::fmt::Display for FileLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a third party attached to a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantKind {
    Vendor,
    Distributor,
    Partner,
}

impl ParticipantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantKind::Vendor => "VENDOR",
            ParticipantKind::Distributor => "DISTRIBUTOR",
            ParticipantKind::Partner => "PARTNER",
        }
    }
}

impl std::str::FromStr for ParticipantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ParticipantKind::Vendor,
            ParticipantKind::Distributor,
            ParticipantKind::Partner,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or_else(|| format!("unknown participant kind '{s}'"))
    }
}

/// Preferred contact channel for a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommPref {
    Email,
    Phone,
    Whatsapp,
}

impl CommPref {
    pub fn as_str(self) -> &'static str {
        match self {
            CommPref::Email => "EMAIL",
            CommPref::Phone => "PHONE",
            CommPref::Whatsapp => "WHATSAPP",
        }
    }
}

impl std::str::FromStr for CommPref {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [CommPref::Email, CommPref::Phone, CommPref::Whatsapp]
            .into_iter()
            .find(|pref| pref.as_str() == s)
            .ok_or_else(|| format!("unknown communication preference '{s}'"))
    }
}

/// A business entity owning deals and three functional-area drives.
///
/// The drive identifiers and base folder name are set together during
/// onboarding; deal folder provisioning requires all four to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Human-facing code, three letters followed by four digits.
    pub code: String,
    pub address: Option<String>,
    pub sub_address: Option<String>,
    pub office_number: Option<String>,
    pub site_id: Option<String>,
    pub sales_drive_id: Option<String>,
    pub projects_drive_id: Option<String>,
    pub finance_drive_id: Option<String>,
    pub base_folder_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The complete remote-storage wiring of a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveConfig {
    pub base_folder_name: String,
    pub sales_drive_id: String,
    pub projects_drive_id: String,
    pub finance_drive_id: String,
}

impl Company {
    /// All-or-nothing view of the drive wiring: `Some` only when the base
    /// folder name and all three drive ids are present and non-empty.
    pub fn drive_config(&self) -> Option<DriveConfig> {
        let non_empty = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };

        Some(DriveConfig {
            base_folder_name: non_empty(&self.base_folder_name)?,
            sales_drive_id: non_empty(&self.sales_drive_id)?,
            projects_drive_id: non_empty(&self.projects_drive_id)?,
            finance_drive_id: non_empty(&self.finance_drive_id)?,
        })
    }
}

/// An end customer contact, optionally referenced by deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub company_id: String,
    pub client_name: String,
    pub mobile_number: Option<String>,
    pub comm_pref: Option<CommPref>,
    pub created_at: DateTime<Utc>,
}

/// A sales deal, mirrored onto a remote folder tree once provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub company_id: String,
    pub customer_id: Option<String>,
    pub project_name: String,
    pub deal_type: DealType,
    pub status: DealStatus,
    pub owner_upn: String,
    pub estimated_size: Option<Decimal>,
    pub is_lost: bool,
    pub is_completed: bool,
    pub lost_reason: Option<String>,
    pub alt_opportunity: Option<String>,
    /// Remote item id of the deal's sales base folder, once provisioned.
    pub sales_item_id: Option<String>,
    /// Canonical URL of the sales base folder.
    pub web_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Lost and completed are the two terminal outcomes; either one freezes
    /// the lifecycle.
    pub fn is_terminal(&self) -> bool {
        self.is_lost || self.is_completed
    }
}

/// A labeled pointer to one of a deal's provisioned sub-folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLink {
    pub id: String,
    pub deal_id: String,
    pub label: FileLabel,
    pub drive_id: String,
    pub item_id: String,
    pub web_url: String,
}

/// A third party attached to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub deal_id: String,
    pub kind: ParticipantKind,
    pub company_name: String,
    pub poc_name: Option<String>,
    pub poc_contact: Option<String>,
    pub poc_email: Option<String>,
    pub product_brand: Option<String>,
}

/// One immutable record of a lifecycle mutation. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub deal_id: String,
    pub action: String,
    pub actor_upn: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_order_is_monotonic() {
        for (index, status) in DealStatus::ORDER.iter().enumerate() {
            assert_eq!(status.position(), index);
        }
        assert_eq!(
            DealStatus::NotStarted.successor(),
            Some(DealStatus::PendingToQuote)
        );
        assert_eq!(DealStatus::InPreSalesStage.successor(), None);
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in DealStatus::ORDER {
            assert_eq!(DealStatus::from_str(status.as_str()), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(DealStatus::from_str("CLOSED_WON").is_err());
    }

    #[test]
    fn drive_config_requires_every_field() {
        let mut company = Company {
            id: "c1".to_string(),
            name: "Acme Pte Ltd".to_string(),
            code: "ACM0001".to_string(),
            address: None,
            sub_address: None,
            office_number: None,
            site_id: Some("site".to_string()),
            sales_drive_id: Some("sales".to_string()),
            projects_drive_id: Some("projects".to_string()),
            finance_drive_id: Some("finance".to_string()),
            base_folder_name: Some("Acme Pte Ltd - ACM0001".to_string()),
            created_at: Utc::now(),
        };
        assert!(company.drive_config().is_some());

        company.finance_drive_id = None;
        assert!(company.drive_config().is_none());

        company.finance_drive_id = Some("  ".to_string());
        assert!(company.drive_config().is_none());
    }

    #[test]
    fn file_label_folder_names() {
        assert_eq!(FileLabel::PurchaseOrders.folder_name(), "Purchase Orders");
        assert_eq!(FileLabel::Quotes.as_str(), "QUOTES");
        assert_eq!(
            FileLabel::from_str("HANDOVER_REPORTS"),
            Ok(FileLabel::HandoverReports)
        );
    }
}
