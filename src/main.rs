use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use deal_desk::config::{config, DealDeskConfig};
use deal_desk::graph::{ClientCredentials, FolderProvisioner, GraphClient, TokenProvider};
use deal_desk::telemetry::init_telemetry;

#[cfg(feature = "database")]
use deal_desk::deals::{DealStateMachine, DealStatus, DealType, FileLabel};
#[cfg(feature = "database")]
use deal_desk::store::{DealStore, NewCustomer, SqliteStore};
#[cfg(feature = "database")]
use deal_desk::workflows::{self, CompanyOnboarding, DealSetup};
#[cfg(feature = "database")]
use rust_decimal::Decimal;

const CONFIG_FILE: &str = "deal-desk.toml";

#[derive(Parser)]
#[command(name = "deal-desk")]
#[command(about = "Sales operations tracker with remote drive folder provisioning")]
#[command(long_about = "deal-desk mirrors companies and deals onto remote cloud drives and \
                       drives each deal through a guarded lifecycle with a full audit trail. \
                       Start with 'deal-desk init' to write a configuration file, then \
                       'deal-desk doctor' to verify remote storage connectivity.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, help = "Overwrite deal-desk.toml if it already exists")]
        force: bool,
    },
    /// Check configuration and remote storage connectivity
    Doctor,
    /// Ensure a folder path exists on a drive and print its reference
    Ensure {
        /// Remote drive identifier
        drive_id: String,
        /// Slash-delimited folder path; an empty path denotes the drive root
        path: String,
        /// Also resolve the folder's canonical URL (fails if unresolvable)
        #[arg(long, help = "Resolve and print the folder's canonical URL")]
        url: bool,
    },
    /// Company onboarding and listing
    #[cfg(feature = "database")]
    #[command(subcommand)]
    Company(CompanyCommands),
    /// Customer registration
    #[cfg(feature = "database")]
    #[command(subcommand)]
    Customer(CustomerCommands),
    /// Deal creation and lifecycle operations
    #[cfg(feature = "database")]
    #[command(subcommand)]
    Deal(DealCommands),
    /// List labeled folders (quotes, invoices, ...) across non-lost deals
    #[cfg(feature = "database")]
    Lists {
        /// File label, e.g. QUOTES or DELIVERY_ORDERS
        label: FileLabel,
    },
}

#[cfg(feature = "database")]
#[derive(Subcommand)]
enum CompanyCommands {
    /// Onboard a company and provision its base folder on all three drives
    Create {
        name: String,
        /// Human-facing code, three letters followed by four digits
        code: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        sub_address: Option<String>,
        #[arg(long)]
        office_number: Option<String>,
        #[arg(long)]
        site_id: String,
        #[arg(long)]
        sales_drive_id: String,
        #[arg(long)]
        projects_drive_id: String,
        #[arg(long)]
        finance_drive_id: String,
    },
    /// List companies with deal tallies and resolved folder URLs
    List,
}

#[cfg(feature = "database")]
#[derive(Subcommand)]
enum CustomerCommands {
    /// Register an end customer under a company
    Create {
        company_id: String,
        client_name: String,
        #[arg(long)]
        mobile_number: Option<String>,
    },
}

#[cfg(feature = "database")]
#[derive(Subcommand)]
enum DealCommands {
    /// Create a deal and provision its folder tree
    Create {
        company_id: String,
        project_name: String,
        /// Deal owner UPN
        owner: String,
        #[arg(long)]
        customer_id: Option<String>,
        #[arg(long, default_value = "NEW_OPPORTUNITY")]
        deal_type: DealType,
        #[arg(long, default_value = "NOT_STARTED")]
        status: DealStatus,
        #[arg(long)]
        estimated_size: Option<Decimal>,
    },
    /// Advance a deal to the next lifecycle status
    Advance {
        deal_id: String,
        /// Must be the immediate successor of the current status
        next_status: DealStatus,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Mark a deal CONFIRMED (fast-forwards early statuses)
    Confirm {
        deal_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Mark a deal lost with a reason
    Lost {
        deal_id: String,
        reason: String,
        #[arg(long)]
        alt_opportunity: Option<String>,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Mark a confirmed deal completed
    Complete {
        deal_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// List deals with company, participant and file context
    List,
    /// Print a deal's audit trail
    Audit { deal_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = config()
        .map(|cfg| cfg.observability.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_telemetry(&log_level)?;

    match cli.command {
        Commands::Init { force } => init_command(force),
        Commands::Doctor => doctor_command().await,
        Commands::Ensure {
            drive_id,
            path,
            url,
        } => ensure_command(&drive_id, &path, url).await,
        #[cfg(feature = "database")]
        Commands::Company(cmd) => company_command(cmd).await,
        #[cfg(feature = "database")]
        Commands::Customer(cmd) => customer_command(cmd).await,
        #[cfg(feature = "database")]
        Commands::Deal(cmd) => deal_command(cmd).await,
        #[cfg(feature = "database")]
        Commands::Lists { label } => lists_command(label).await,
    }
}

#[cfg(feature = "database")]
async fn lists_command(label: FileLabel) -> Result<()> {
    let store = open_store().await?;
    let rows = workflows::files_by_label(&store, label).await?;
    for row in rows {
        println!("{} | {} | {}", row.company, row.project, row.url);
    }
    Ok(())
}

fn init_command(force: bool) -> Result<()> {
    if Path::new(CONFIG_FILE).exists() && !force {
        println!("⚠️  {CONFIG_FILE} already exists (use --force to overwrite)");
        return Ok(());
    }
    DealDeskConfig::default().save_to_file(CONFIG_FILE)?;
    println!("✅ Wrote starter configuration to {CONFIG_FILE}");
    println!("   → Fill in graph.tenant_id, graph.client_id and graph.client_secret");
    println!("   → Or export GRAPH_TENANT_ID / GRAPH_CLIENT_ID / GRAPH_CLIENT_SECRET");
    Ok(())
}

async fn doctor_command() -> Result<()> {
    let cfg = config()?;

    println!("deal-desk doctor");
    println!("────────────────");

    if Path::new(CONFIG_FILE).exists() {
        println!("✅ {CONFIG_FILE} found");
    } else {
        println!("⚠️  {CONFIG_FILE} not found (environment variables only)");
    }

    if !cfg.graph.is_configured() {
        println!("❌ Remote storage credentials missing");
        println!("   → Run: deal-desk init");
        println!("   → Set graph.tenant_id, graph.client_id, graph.client_secret");
        return Ok(());
    }
    println!("✅ Remote storage credentials present");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cfg.graph.request_timeout_secs))
        .build()?;
    let auth = ClientCredentials::new(
        http,
        cfg.graph.authority_base.clone(),
        cfg.graph.tenant_id.clone(),
        cfg.graph.client_id.clone(),
        cfg.graph.client_secret.clone(),
    );
    match auth.acquire().await {
        Ok(_) => println!("✅ Token acquisition succeeded"),
        Err(e) => {
            println!("❌ Token acquisition failed: {e}");
            println!("   → Check tenant and application credentials");
        }
    }

    #[cfg(feature = "database")]
    {
        let db = cfg.database.clone().unwrap_or_default();
        match SqliteStore::connect(&db.url).await {
            Ok(_) => println!("✅ Database reachable at {}", db.url),
            Err(e) => println!("❌ Database check failed: {e}"),
        }
    }

    Ok(())
}

async fn ensure_command(drive_id: &str, path: &str, resolve_url: bool) -> Result<()> {
    let provisioner = build_provisioner()?;

    if resolve_url {
        let folder = provisioner.ensure_with_url(drive_id, path).await?;
        println!("✅ Folder ready: {}", folder.web_url);
        println!("   item id: {}", folder.item_id);
    } else {
        let item = provisioner.ensure(drive_id, path).await?;
        println!(
            "✅ Folder ready: {} (id: {})",
            item.name.as_deref().unwrap_or("<root>"),
            item.id.as_deref().unwrap_or("<unknown>")
        );
    }
    Ok(())
}

fn build_provisioner() -> Result<FolderProvisioner> {
    let cfg = config()?;
    let client = GraphClient::new(&cfg.graph)?;
    Ok(FolderProvisioner::new(Arc::new(client)))
}

#[cfg(feature = "database")]
async fn open_store() -> Result<SqliteStore> {
    let cfg = config()?;
    let db = cfg.database.clone().unwrap_or_default();
    Ok(SqliteStore::connect(&db.url).await?)
}

#[cfg(feature = "database")]
async fn company_command(cmd: CompanyCommands) -> Result<()> {
    let store = open_store().await?;
    let provisioner = build_provisioner()?;

    match cmd {
        CompanyCommands::Create {
            name,
            code,
            address,
            sub_address,
            office_number,
            site_id,
            sales_drive_id,
            projects_drive_id,
            finance_drive_id,
        } => {
            let company = workflows::onboard_company(
                &store,
                &provisioner,
                CompanyOnboarding {
                    name,
                    code,
                    address,
                    sub_address,
                    office_number,
                    site_id,
                    sales_drive_id,
                    projects_drive_id,
                    finance_drive_id,
                },
            )
            .await?;
            println!("✅ Company {} onboarded (id: {})", company.code, company.id);
        }
        CompanyCommands::List => {
            let summaries = workflows::company_summaries(&store, &provisioner).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }
    Ok(())
}

#[cfg(feature = "database")]
async fn customer_command(cmd: CustomerCommands) -> Result<()> {
    let store = open_store().await?;

    match cmd {
        CustomerCommands::Create {
            company_id,
            client_name,
            mobile_number,
        } => {
            let customer = workflows::create_customer(
                &store,
                NewCustomer {
                    company_id,
                    client_name,
                    mobile_number,
                    comm_pref: None,
                },
            )
            .await?;
            println!("✅ Customer registered (id: {})", customer.id);
        }
    }
    Ok(())
}

#[cfg(feature = "database")]
async fn deal_command(cmd: DealCommands) -> Result<()> {
    let store = Arc::new(open_store().await?);

    match cmd {
        DealCommands::Create {
            company_id,
            project_name,
            owner,
            customer_id,
            deal_type,
            status,
            estimated_size,
        } => {
            let provisioner = build_provisioner()?;
            let deal = workflows::create_deal(
                store.as_ref(),
                &provisioner,
                DealSetup {
                    company_id,
                    customer_id,
                    project_name,
                    deal_type,
                    status,
                    owner_upn: owner,
                    estimated_size,
                },
            )
            .await?;
            println!("✅ Deal created (id: {})", deal.id);
            if let Some(url) = deal.web_url {
                println!("   folder: {url}");
            }
        }
        DealCommands::Advance {
            deal_id,
            next_status,
            actor,
        } => {
            let machine = DealStateMachine::new(store);
            let deal = machine
                .advance(&deal_id, next_status, actor.as_deref())
                .await?;
            println!("✅ Deal advanced to {}", deal.status);
        }
        DealCommands::Confirm { deal_id, actor } => {
            let machine = DealStateMachine::new(store);
            let deal = machine.confirm(&deal_id, actor.as_deref()).await?;
            println!("✅ Deal confirmed (status: {})", deal.status);
        }
        DealCommands::Lost {
            deal_id,
            reason,
            alt_opportunity,
            actor,
        } => {
            let machine = DealStateMachine::new(store);
            machine
                .mark_lost(&deal_id, &reason, alt_opportunity.as_deref(), actor.as_deref())
                .await?;
            println!("✅ Deal marked lost");
        }
        DealCommands::Complete { deal_id, actor } => {
            let machine = DealStateMachine::new(store);
            machine.mark_completed(&deal_id, actor.as_deref()).await?;
            println!("✅ Deal marked completed");
        }
        DealCommands::List => {
            let summaries = workflows::deal_summaries(store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        DealCommands::Audit { deal_id } => {
            let entries = store.list_audit(&deal_id).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}
