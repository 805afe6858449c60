//! Driveloft CLI - administer the Google Drive attachment offload.
//!
//! This tool wires the offload engine to a JSON-file-backed site directory
//! and drives the user-invoked operations: serving the endpoint surface,
//! the authorization flow, bulk migration and diagnostics.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use driveloft_offload::{
    AuthorizeOutcome, ConfigCache, JsonConfigStore, JsonDocumentStore, OffloadEngine, SiteRoots,
};
use driveloft_storage::{DriveFactory, OauthCredentials, OauthHelper};

#[derive(Parser)]
#[command(name = "driveloft")]
#[command(about = "Driveloft - Google Drive attachment offload")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Site directory holding configuration, records and attachment files.
    #[arg(short, long)]
    site_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP endpoint surface.
    Serve {
        /// Address to bind.
        #[arg(short, long, default_value = "127.0.0.1:8099")]
        bind: String,
    },

    /// Start or complete the Google Drive authorization flow.
    Authorize {
        /// Discard the stored authorization and start over.
        #[arg(long)]
        reauthorize: bool,

        /// One-time authorization code from the consent callback.
        #[arg(long)]
        code: Option<String>,
    },

    /// Offload every attachment still stored locally.
    Migrate,

    /// Probe the Google Drive connection.
    TestConnection,

    /// Show the offload configuration summary.
    Settings,

    /// Show remote metadata for an offloaded object.
    Info {
        /// Remote object id.
        #[arg(short, long)]
        file_id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let site_dir = cli.site_dir.unwrap_or_else(default_site_dir);

    match cli.command {
        Commands::Serve { bind } => cmd_serve(&site_dir, &bind).await,

        Commands::Authorize { reauthorize, code } => {
            cmd_authorize(&site_dir, reauthorize, code.as_deref()).await
        }

        Commands::Migrate => cmd_migrate(&site_dir).await,

        Commands::TestConnection => cmd_test_connection(&site_dir).await,

        Commands::Settings => cmd_settings(&site_dir).await,

        Commands::Info { file_id } => cmd_info(&site_dir, &file_id).await,

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "driveloft",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Default site directory under the user's data dir.
fn default_site_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("driveloft"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Wire the engine to a site directory.
async fn build_engine(site_dir: &Path) -> Result<Arc<OffloadEngine>> {
    let credentials = OauthCredentials::from_env().context(
        "OAuth credentials missing. Set DRIVELOFT_CLIENT_ID and DRIVELOFT_CLIENT_SECRET.",
    )?;
    let oauth = Arc::new(OauthHelper::new(credentials).context("Invalid OAuth credentials")?);

    let config = Arc::new(ConfigCache::new(Arc::new(JsonConfigStore::in_site_dir(
        site_dir,
    ))));
    let store = Arc::new(
        JsonDocumentStore::open(site_dir.join("records.json"))
            .await
            .context("Failed to open record store")?,
    );

    let engine = OffloadEngine::new(
        config,
        store,
        Arc::new(DriveFactory::new(oauth.clone())),
        oauth,
        SiteRoots::new(site_dir),
    );

    Ok(Arc::new(engine))
}

/// Run the endpoint surface.
async fn cmd_serve(site_dir: &Path, bind: &str) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    let app = axum::Router::new().nest("/api/driveloft", driveloft_api::router(engine));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!("Serving Driveloft endpoints on http://{}/api/driveloft", bind);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Start or complete the authorization flow.
async fn cmd_authorize(site_dir: &Path, reauthorize: bool, code: Option<&str>) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    match engine
        .authorize_access(reauthorize, code)
        .await
        .context("Authorization failed")?
    {
        AuthorizeOutcome::ConsentUrl(url) => {
            println!("Visit the consent page to authorize Google Drive access:");
            println!("  {}", url);
            println!("Then re-run: driveloft authorize --code <code>");

            if open::that(&url).is_ok() {
                println!("(opened in your browser)");
            }
        }
        AuthorizeOutcome::Authorized => {
            println!("Authorization successful. Refresh credential stored.");
        }
    }

    Ok(())
}

/// Offload every attachment still stored locally.
async fn cmd_migrate(site_dir: &Path) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    let report = engine
        .migrate_existing()
        .await
        .context("Migration failed")?;

    println!("Migration finished:");
    println!("  migrated: {}", report.migrated);
    println!("  errors:   {}", report.errors);
    println!("  total:    {}", report.total);

    Ok(())
}

/// Probe the Google Drive connection.
async fn cmd_test_connection(site_dir: &Path) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    let status = engine.test_connection().await;
    if status.success {
        println!("OK: {}", status.message);
        Ok(())
    } else {
        anyhow::bail!("Connection test failed: {}", status.message);
    }
}

/// Show the offload configuration summary.
async fn cmd_settings(site_dir: &Path) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    let view = engine.settings().await.context("Failed to load settings")?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}

/// Show remote metadata for an offloaded object.
async fn cmd_info(site_dir: &Path, file_id: &str) -> Result<()> {
    let engine = build_engine(site_dir).await?;

    match engine
        .file_info(file_id)
        .await
        .context("Metadata lookup failed")?
    {
        Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
        None => println!("No metadata available for {}", file_id),
    }

    Ok(())
}
