use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use kismet_bridge::app::bridge_service::BridgeService;
use kismet_bridge::config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use kismet_bridge::constants::{KISMET_PASSWORD_KEY, KISMET_USERNAME_KEY, REQUIRED_FIELDS};
use kismet_bridge::credentials::{env_var_name, CredentialProvider, EnvCredentialStore};
use kismet_bridge::infra::field_explorer::{
    export_fields, list_available_fields, validate_fields, FieldExplorer,
};
use kismet_bridge::infra::kismet_client::KismetClient;
use kismet_bridge::infra::transport::TransportSender;
use kismet_bridge::logging::init_logging;
use kismet_bridge::metrics::init_metrics;
use kismet_bridge::pipeline::normalize::DeviceNormalizer;

#[derive(Parser)]
#[command(name = "kismet_bridge")]
#[command(about = "Forward Kismet device records to an ATAK consumer")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll Kismet and forward devices until interrupted
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Probe the Kismet API once and print its status
    Status {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Report the fields of a sample device and check the ones the bridge reads
    Fields {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Device key to inspect; defaults to the first recently seen device
        #[arg(long)]
        key: Option<String>,
        /// Write the field report to this JSON file
        #[arg(long)]
        export: Option<String>,
    },
    /// Print the environment variables Kismet credentials are read from, and whether each is set
    CredentialEnv,
}

fn load_config(path: &str) -> anyhow::Result<BridgeConfig> {
    let (config, notices) = BridgeConfig::read(path).with_context(|| format!("loading {}", path))?;
    init_logging(&config.logging);
    for notice in &notices {
        warn!("{}", notice);
    }
    Ok(config)
}

async fn connect(config: &BridgeConfig, credentials: &EnvCredentialStore) -> anyhow::Result<KismetClient> {
    let creds = credentials.kismet_credentials();
    if creds.is_none() {
        warn!("No Kismet credentials found, connecting without authentication");
    }
    let client = KismetClient::connect(&config.kismet, creds)
        .await
        .context("connecting to Kismet")?;
    Ok(client)
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    init_metrics(config.metrics.listen_addr.as_deref());
    info!("Initializing Kismet-ATAK bridge service");

    let credentials = EnvCredentialStore::new();
    let client = connect(&config, &credentials).await?;
    let sender = TransportSender::new(&config.atak).context("configuring transport")?;
    let normalizer = DeviceNormalizer::new(config.formatter.clone());
    let mut service = BridgeService::new(
        Box::new(client),
        Box::new(sender),
        normalizer,
        &config.service,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Cannot listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    service.start(shutdown_rx).await.context("bridge service")?;
    Ok(())
}

async fn status(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let credentials = EnvCredentialStore::new();
    let mut client = connect(&config, &credentials).await?;
    let status = client.get_system_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    client.close();
    Ok(())
}

async fn fields(config_path: &str, key: Option<String>, export: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let credentials = EnvCredentialStore::new();
    let mut client = connect(&config, &credentials).await?;

    println!("Fetching sample device...");
    let device = FieldExplorer::new(&mut client).sample_device(key.as_deref()).await;
    client.close();
    let Some(device) = device else {
        bail!("Failed to fetch device data");
    };

    let mut available = list_available_fields(&device);
    available.sort();
    println!("\nKISMET DEVICE FIELD REPORT");
    println!("Total fields found: {}\n", available.len());
    for field in &available {
        println!("  {}", field);
    }

    if let Some(path) = export {
        let count = export_fields(&device, &path)?;
        println!("\n📄 Exported {} fields to {}", count, path);
    }

    let missing: Vec<String> = validate_fields(&REQUIRED_FIELDS, &device)
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(field, _)| field)
        .collect();
    if missing.is_empty() {
        println!("\n✅ All required fields present in the sample device");
    } else {
        println!("\n⚠️  {} required fields not found in the sample device:", missing.len());
        for field in &missing {
            println!("   - {}", field);
        }
    }
    Ok(())
}

fn credential_env() {
    let store = EnvCredentialStore::new();
    println!("Kismet credentials are read from the environment (or a .env file):");
    for key in [KISMET_USERNAME_KEY, KISMET_PASSWORD_KEY] {
        let state = if store.get(key).is_some() { "set" } else { "not set" };
        println!("  {:<32} {}", env_var_name(key), state);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Status { config } => status(&config).await,
        Commands::Fields { config, key, export } => fields(&config, key, export).await,
        Commands::CredentialEnv => {
            credential_env();
            Ok(())
        }
    }
}
