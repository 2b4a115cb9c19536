use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use folio_sync::chat::{CompletionClient, HttpCompletionClient, ResumeChat};
use folio_sync::contact::{
    CaptchaVerifier, ContactService, ContactSettings, HttpEmailRelay, RecaptchaVerifier,
    StaticCaptcha,
};
use folio_sync::web::{self, AppState};
use folio_sync::{
    AutoConfirm, Car, CrmWorkspace, Customer, MemoryAuthProvider, MemoryDocumentStore, Sale,
    ServerConfig, SyncConfig, TaskDraft, TaskWorkspace,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "folio-sync")]
#[command(about = "Portfolio backend and demo-app data layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat/contact HTTP backend
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a scripted session against in-memory collaborators
    Demo {
        #[arg(value_enum)]
        app: DemoApp,
        /// Collection namespace (`artifacts/{app_id}`)
        #[arg(long)]
        app_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DemoApp {
    Crm,
    Tasks,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port } => {
            let mut config =
                ServerConfig::from_env().context("failed to load server configuration")?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await
        }
        Command::Demo { app, app_id } => {
            let mut config = SyncConfig::from_env().context("failed to load sync configuration")?;
            if let Some(app_id) = app_id {
                config = config.app_id(&app_id);
            }
            match app {
                DemoApp::Crm => crm_demo(&config).await,
                DemoApp::Tasks => tasks_demo(&config).await,
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("folio_sync=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let resume = match &config.resume_text_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read resume text {}", path.display()))?,
        None => {
            warn!("FOLIO_RESUME_TEXT not set, chat answers without a resume");
            String::new()
        }
    };

    let completion: Arc<dyn CompletionClient> = Arc::new(HttpCompletionClient::new(
        config.completion_endpoint.clone(),
        config.completion_api_key.clone(),
        config.completion_model.clone(),
    ));
    let captcha: Arc<dyn CaptchaVerifier> = match &config.captcha_secret {
        Some(secret) => Arc::new(RecaptchaVerifier::new(secret.clone(), config.captcha_min_score)),
        None => {
            warn!("FOLIO_CAPTCHA_SECRET not set, captcha checks are disabled");
            Arc::new(StaticCaptcha::pass())
        }
    };
    let relay = Arc::new(HttpEmailRelay::new(
        config.relay_endpoint.clone(),
        config.relay_api_key.clone(),
    ));

    let state = AppState::new(
        Arc::new(ResumeChat::new(completion, resume)),
        Arc::new(ContactService::new(
            captcha,
            relay,
            ContactSettings {
                mail_from: config.mail_from.clone(),
                owner_email: config.owner_email.clone(),
                resume_attachment: config.resume_attachment_path.clone(),
            },
        )),
    );

    web::serve(&config.address(), state, shutdown_signal()).await
}

async fn tasks_demo(config: &SyncConfig) -> Result<()> {
    let auth = Arc::new(MemoryAuthProvider::new());
    let store = Arc::new(MemoryDocumentStore::new());
    let workspace = TaskWorkspace::new(config, auth, store, Arc::new(AutoConfirm::accept()));

    // Added before any identity exists: held by the reconciler.
    let due = NaiveDate::from_ymd_opt(2025, 1, 31);
    workspace.add(TaskDraft::new("Draft the portfolio intro", due)).await?;
    info!(state = ?workspace.pending_state(), "before sign-in");

    let identity = workspace.start().await?;
    info!(identity = %identity, anonymous = identity.is_anonymous(), "session resolved");

    workspace.add(TaskDraft::new("Review the CRM demo", None)).await?;
    let mirror = workspace.mirror();
    let snapshot = mirror.wait_for(|s| s.len() >= 2).await;
    if let Some(first) = snapshot.items().first() {
        workspace.toggle_completed(first).await?;
    }
    mirror.wait_for(|s| s.iter().any(|t| t.value.completed)).await;

    let today = chrono::Utc::now().date_naive();
    for record in workspace.tasks() {
        let task = record.value();
        info!(
            key = %record.key(),
            title = %task.title,
            completed = task.completed,
            overdue = task.is_overdue(today),
            pending = record.is_pending(),
            "task"
        );
    }

    workspace.logout().await?;
    info!(mirrored = workspace.mirror().len(), "signed out");
    Ok(())
}

async fn crm_demo(config: &SyncConfig) -> Result<()> {
    let auth = Arc::new(MemoryAuthProvider::new());
    let store = Arc::new(MemoryDocumentStore::new());
    let workspace = CrmWorkspace::new(config, auth, store, Arc::new(AutoConfirm::accept()));

    let identity = workspace.start().await?;
    info!(identity = %identity, "session resolved");

    let civic = workspace
        .add_car(Car::new("Honda", "Civic", 20000.0).with_year(2019))
        .await?;
    workspace
        .add_car(Car::new("Toyota", "Corolla", 17500.0).with_year(2021))
        .await?;
    let buyer = workspace
        .add_customer(Customer::new("Ada Lovelace").with_email("ada@example.com"))
        .await?;

    let sale = workspace.add_sale(Sale::new(&civic, &buyer, 19000.0)).await?;
    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        workspace.dashboard().wait_for(|s| s.total_sales == 1 && s.sold_cars == 1),
    )
    .await
    .context("dashboard did not settle")?;
    info!(?stats, "after sale");

    for detail in workspace.sale_details() {
        info!(
            car = detail.car_label(),
            customer = detail.customer_label(),
            price = detail.sale_price,
            "sale"
        );
    }

    workspace.delete_sale(&sale).await?;
    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        workspace.dashboard().wait_for(|s| s.total_sales == 0 && s.available_cars == 2),
    )
    .await
    .context("dashboard did not settle")?;
    info!(?stats, "after deleting the sale");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
