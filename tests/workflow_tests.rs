//! Company onboarding and deal-creation workflows against a mocked drive
//! API: three-drive fan-out, nine-subfolder trees, partial-failure behavior.

mod common;

use common::*;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, ResponseTemplate};

use deal_desk::deals::{DealStatus, DealType, FileLabel};
use deal_desk::store::{DealStore, DealUpdate, MemoryStore, NewCompany, NewDeal, StoreError};
use deal_desk::workflows::{
    company_summaries, create_deal, onboard_company, CompanyOnboarding, DealSetup, WorkflowError,
};

const SALES: &str = "drive-sales";
const PROJECTS: &str = "drive-projects";
const FINANCE: &str = "drive-finance";
const BASE: &str = "Acme Pte Ltd - ACM0001";

fn onboarding_input() -> CompanyOnboarding {
    CompanyOnboarding {
        name: "Acme Pte Ltd".to_string(),
        code: "acm0001".to_string(),
        address: Some("1 Harbour Front".to_string()),
        sub_address: None,
        office_number: None,
        site_id: "site-acme".to_string(),
        sales_drive_id: SALES.to_string(),
        projects_drive_id: PROJECTS.to_string(),
        finance_drive_id: FINANCE.to_string(),
    }
}

fn configured_company() -> NewCompany {
    NewCompany {
        name: "Acme Pte Ltd".to_string(),
        code: "ACM0001".to_string(),
        address: None,
        sub_address: None,
        office_number: None,
        site_id: Some("site-acme".to_string()),
        sales_drive_id: Some(SALES.to_string()),
        projects_drive_id: Some(PROJECTS.to_string()),
        finance_drive_id: Some(FINANCE.to_string()),
        base_folder_name: Some(BASE.to_string()),
    }
}

fn deal_input(company_id: &str, project: &str) -> DealSetup {
    DealSetup {
        company_id: company_id.to_string(),
        customer_id: None,
        project_name: project.to_string(),
        deal_type: DealType::NewOpportunity,
        status: DealStatus::NotStarted,
        owner_upn: "alex@acme.test".to_string(),
        estimated_size: None,
    }
}

/// Mount the full happy-path mock set for one drive's deal folder tree.
async fn mount_deal_tree(
    mock: &GraphApiMock,
    drive: &str,
    deal_path: &str,
    id_prefix: &str,
    labels: &[FileLabel],
) {
    mock.mock_existing_folder(drive, BASE, &format!("{id_prefix}-base")).await;
    mock.mock_create_folder(drive, deal_path, &format!("{id_prefix}-deal")).await;
    for label in labels {
        mock.mock_create_folder(
            drive,
            &format!("{}/{}", deal_path, label.folder_name()),
            &format!("{id_prefix}-{}", label.as_str().to_lowercase()),
        )
        .await;
    }
}

#[tokio::test]
async fn onboarding_provisions_the_base_folder_on_all_three_drives() {
    let mock = GraphApiMock::start().await;
    mock.mock_create_folder(SALES, BASE, "s-base").await;
    mock.mock_create_folder(PROJECTS, BASE, "p-base").await;
    mock.mock_create_folder(FINANCE, BASE, "f-base").await;

    let store = MemoryStore::new();
    let provisioner = mock.provisioner();

    let company = onboard_company(&store, &provisioner, onboarding_input())
        .await
        .unwrap();

    assert_eq!(company.code, "ACM0001");
    assert_eq!(company.base_folder_name.as_deref(), Some(BASE));
    assert!(company.drive_config().is_some());

    // Exactly one creation call per drive.
    mock.server.verify().await;
}

#[tokio::test]
async fn onboarding_rejects_a_malformed_code_before_touching_anything() {
    let mock = GraphApiMock::start().await;
    let store = MemoryStore::new();
    let provisioner = mock.provisioner();

    let mut input = onboarding_input();
    input.code = "ACME01".to_string();

    let result = onboard_company(&store, &provisioner, input).await;
    assert!(matches!(result, Err(WorkflowError::InvalidCompanyCode(_))));
    assert!(store.list_companies().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_duplicate_company_code_surfaces_as_its_own_error_kind() {
    let mock = GraphApiMock::start().await;
    mock.mock_create_folder(SALES, BASE, "s-base").await;
    mock.mock_create_folder(PROJECTS, BASE, "p-base").await;
    mock.mock_create_folder(FINANCE, BASE, "f-base").await;

    let store = MemoryStore::new();
    let provisioner = mock.provisioner();

    onboard_company(&store, &provisioner, onboarding_input())
        .await
        .unwrap();

    let mut second = onboarding_input();
    second.name = "Acme Industrial".to_string();

    match onboard_company(&store, &provisioner, second).await {
        Err(WorkflowError::Store(StoreError::DuplicateCompanyCode(code))) => {
            assert_eq!(code, "ACM0001")
        }
        other => panic!("expected duplicate-code error, got {other:?}"),
    }
}

#[tokio::test]
async fn deal_creation_provisions_the_nine_labeled_subfolders() {
    let mock = GraphApiMock::start().await;
    let deal_path = format!("{BASE}/0001 - Office Fitout");

    mount_deal_tree(
        &mock,
        SALES,
        &deal_path,
        "s",
        &[FileLabel::Quotes, FileLabel::PurchaseOrders, FileLabel::Agreements],
    )
    .await;
    mount_deal_tree(
        &mock,
        PROJECTS,
        &deal_path,
        "p",
        &[
            FileLabel::ServiceReports,
            FileLabel::HandoverReports,
            FileLabel::DeliveryOrders,
        ],
    )
    .await;
    mount_deal_tree(
        &mock,
        FINANCE,
        &deal_path,
        "f",
        &[FileLabel::Invoices, FileLabel::CreditNotes, FileLabel::Receipts],
    )
    .await;

    let store = MemoryStore::new();
    let company = store.create_company(configured_company()).await.unwrap();
    let provisioner = mock.provisioner();

    let deal = create_deal(&store, &provisioner, deal_input(&company.id, "Office Fitout"))
        .await
        .unwrap();

    assert_eq!(deal.sales_item_id.as_deref(), Some("s-deal"));
    assert_eq!(deal.web_url.as_deref(), Some(folder_url("s-deal").as_str()));

    let files = store.list_deal_files(&deal.id).await.unwrap();
    assert_eq!(files.len(), 9);

    let quotes = files.iter().find(|f| f.label == FileLabel::Quotes).unwrap();
    assert_eq!(quotes.drive_id, SALES);
    assert_eq!(quotes.item_id, "s-quotes");

    let invoices = files.iter().find(|f| f.label == FileLabel::Invoices).unwrap();
    assert_eq!(invoices.drive_id, FINANCE);
    assert_eq!(invoices.item_id, "f-invoices");

    // One creation per folder across the whole fan-out, shared ancestors
    // walked but never re-created.
    mock.server.verify().await;
}

#[tokio::test]
async fn deal_sequence_numbers_count_existing_company_deals() {
    let mock = GraphApiMock::start().await;
    let deal_path = format!("{BASE}/0002 - Warehouse Expansion");

    mount_deal_tree(
        &mock,
        SALES,
        &deal_path,
        "s2",
        &[FileLabel::Quotes, FileLabel::PurchaseOrders, FileLabel::Agreements],
    )
    .await;
    mount_deal_tree(
        &mock,
        PROJECTS,
        &deal_path,
        "p2",
        &[
            FileLabel::ServiceReports,
            FileLabel::HandoverReports,
            FileLabel::DeliveryOrders,
        ],
    )
    .await;
    mount_deal_tree(
        &mock,
        FINANCE,
        &deal_path,
        "f2",
        &[FileLabel::Invoices, FileLabel::CreditNotes, FileLabel::Receipts],
    )
    .await;

    let store = MemoryStore::new();
    let company = store.create_company(configured_company()).await.unwrap();
    store
        .create_deal(
            NewDeal {
                company_id: company.id.clone(),
                customer_id: None,
                project_name: "First Deal".to_string(),
                deal_type: DealType::Confirmed,
                status: DealStatus::WaitingForConfirmation,
                owner_upn: "alex@acme.test".to_string(),
                estimated_size: None,
                sales_item_id: None,
                web_url: None,
            },
            Vec::new(),
        )
        .await
        .unwrap();

    let provisioner = mock.provisioner();
    let deal = create_deal(
        &store,
        &provisioner,
        deal_input(&company.id, "Warehouse Expansion"),
    )
    .await
    .unwrap();

    // The mocks only match "0002 - Warehouse Expansion" paths, so reaching
    // here proves the sequence came from the existing deal count.
    assert_eq!(deal.sales_item_id.as_deref(), Some("s2-deal"));
    mock.server.verify().await;
}

#[tokio::test]
async fn a_failing_drive_aborts_the_deal_but_keeps_folders_already_created() {
    let mock = GraphApiMock::start().await;
    let deal_path = format!("{BASE}/0001 - Office Fitout");

    mount_deal_tree(
        &mock,
        SALES,
        &deal_path,
        "s",
        &[FileLabel::Quotes, FileLabel::PurchaseOrders, FileLabel::Agreements],
    )
    .await;
    mount_deal_tree(
        &mock,
        PROJECTS,
        &deal_path,
        "p",
        &[
            FileLabel::ServiceReports,
            FileLabel::HandoverReports,
            FileLabel::DeliveryOrders,
        ],
    )
    .await;
    // Finance is down hard.
    Mock::given(method("GET"))
        .and(path_regex(format!("^/drives/{FINANCE}/.*")))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": { "code": "serviceNotAvailable", "message": "down for maintenance" }
        })))
        .mount(&mock.server)
        .await;

    let store = MemoryStore::new();
    let company = store.create_company(configured_company()).await.unwrap();
    let provisioner = mock.provisioner();

    let result = create_deal(&store, &provisioner, deal_input(&company.id, "Office Fitout")).await;
    assert!(matches!(
        result,
        Err(WorkflowError::Graph(deal_desk::graph::GraphError::Transient(_)))
    ));

    // No deal record was written, but the sales and projects folders that
    // were already created persist; verify() checks their single creation
    // calls all happened.
    assert!(store.list_deals().await.unwrap().is_empty());
    mock.server.verify().await;
}

#[tokio::test]
async fn deal_creation_requires_the_full_drive_configuration() {
    let mock = GraphApiMock::start().await;
    let store = MemoryStore::new();
    let provisioner = mock.provisioner();

    let mut unconfigured = configured_company();
    unconfigured.finance_drive_id = None;
    let company = store.create_company(unconfigured).await.unwrap();

    let result = create_deal(&store, &provisioner, deal_input(&company.id, "Office Fitout")).await;
    assert!(matches!(result, Err(WorkflowError::MissingDriveConfig(_))));

    let missing = create_deal(&store, &provisioner, deal_input("ghost-company", "X")).await;
    assert!(matches!(missing, Err(WorkflowError::CompanyNotFound(_))));
}

#[tokio::test]
async fn company_summaries_tally_deals_and_resolve_urls_best_effort() {
    let mock = GraphApiMock::start().await;
    mock.mock_existing_folder(SALES, BASE, "s-base").await;
    mock.mock_existing_folder(PROJECTS, BASE, "p-base").await;
    mock.mock_existing_folder(FINANCE, BASE, "f-base").await;

    let store = MemoryStore::new();
    let company = store.create_company(configured_company()).await.unwrap();

    let seed = |deal_type: DealType| NewDeal {
        company_id: company.id.clone(),
        customer_id: None,
        project_name: "Seeded".to_string(),
        deal_type,
        status: DealStatus::NotStarted,
        owner_upn: "alex@acme.test".to_string(),
        estimated_size: None,
        sales_item_id: None,
        web_url: None,
    };
    let active = store.create_deal(seed(DealType::NewOpportunity), Vec::new()).await.unwrap();
    let confirmed = store.create_deal(seed(DealType::Confirmed), Vec::new()).await.unwrap();
    let lost = store.create_deal(seed(DealType::Upcoming), Vec::new()).await.unwrap();
    store
        .update_deal(
            &lost.id,
            DealUpdate {
                is_lost: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .update_deal(
            &confirmed.id,
            DealUpdate {
                is_completed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A second company with no drive wiring resolves no URLs.
    let bare = store
        .create_company(NewCompany {
            name: "Bare Holdings".to_string(),
            code: "BRH0001".to_string(),
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

    let provisioner = mock.provisioner();
    let summaries = company_summaries(&store, &provisioner).await.unwrap();

    let acme = summaries.iter().find(|s| s.id == company.id).unwrap();
    assert_eq!(acme.active_deals, 1);
    assert_eq!(acme.confirmed_deals, 1);
    assert_eq!(acme.completed_deals, 1);
    assert_eq!(acme.lost_deals, 1);
    assert_eq!(acme.sales_url.as_deref(), Some(folder_url("s-base").as_str()));
    assert_eq!(acme.finance_url.as_deref(), Some(folder_url("f-base").as_str()));

    let bare_summary = summaries.iter().find(|s| s.id == bare.id).unwrap();
    assert!(bare_summary.sales_url.is_none());
    assert_eq!(bare_summary.active_deals, 0);

    // The untouched active deal really is the only active one.
    assert_eq!(active.deal_type, DealType::NewOpportunity);
}
