//! CarInfo CLI - run the server and inspect its moving parts

use anyhow::{Context, Result};
use carinfo_core::{
    next_identifier, Config, DecisionInput, FileStore, LogFormat, PolicyConfig, PolicyMode, Store,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carinfo")]
#[command(about = "CarInfo - policy-gated car inventory service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path where the JSON data file is stored
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// URL of the policy endpoint to query
        #[arg(short = 'u', long)]
        opa_url: Option<String>,

        /// Authorization mode (open, http, allow-all, deny-all)
        #[arg(short, long)]
        mode: Option<PolicyMode>,

        /// Location of the boolean decision in the policy response
        #[arg(long)]
        decision_path: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep data in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Ask for a single authorization decision
    Decide {
        /// Resource path, e.g. cars/car3/status
        #[arg(long)]
        resource: String,

        /// Action (HTTP verb)
        #[arg(long)]
        action: String,

        /// Subject, as the `user` header would carry it
        #[arg(long)]
        subject: Option<String>,

        /// URL of the policy endpoint to query
        #[arg(short = 'u', long)]
        opa_url: Option<String>,

        /// Authorization mode (open, http, allow-all, deny-all)
        #[arg(short, long)]
        mode: Option<PolicyMode>,

        /// Location of the boolean decision in the policy response
        #[arg(long)]
        decision_path: Option<String>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Summarize a data file
    Inspect {
        /// Path of the JSON data file
        #[arg(short, long, default_value = "./data.json")]
        data: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            data,
            opa_url,
            mode,
            decision_path,
            port,
            ephemeral,
        } => {
            let mut config = Config::load(config.as_deref()).context("Failed to load configuration")?;
            if let Some(data) = data {
                config.server.data_file = data;
            }
            if let Some(port) = port {
                config.server.bind_address = with_port(&config.server.bind_address, port);
            }
            config.server.ephemeral |= ephemeral;
            apply_policy_flags(&mut config.policy, opa_url, mode, decision_path);
            if cli.verbose {
                config.logging.level = "debug".to_string();
            }
            serve_command(config).await?;
        }
        Commands::Decide {
            resource,
            action,
            subject,
            opa_url,
            mode,
            decision_path,
            format,
        } => {
            if cli.verbose {
                tracing_init();
            }
            let mut config = Config::load(None).context("Failed to load configuration")?;
            apply_policy_flags(&mut config.policy, opa_url, mode, decision_path);
            decide_command(&config.policy, resource, action, subject, format).await?;
        }
        Commands::Inspect { data, format } => {
            inspect_command(data, format)?;
        }
    }

    Ok(())
}

fn tracing_init() {
    let logging = carinfo_core::LoggingConfig {
        level: "carinfo_core=debug".to_string(),
        format: LogFormat::Pretty,
        otel_enabled: false,
    };
    if let Err(e) = carinfo_server::telemetry::init(&logging, "carinfo") {
        eprintln!("{} Failed to initialize logging: {}", "!".yellow(), e);
    }
}

fn apply_policy_flags(
    policy: &mut PolicyConfig,
    opa_url: Option<String>,
    mode: Option<PolicyMode>,
    decision_path: Option<String>,
) {
    if opa_url.is_some() {
        policy.url = opa_url;
    }
    if mode.is_some() {
        policy.mode = mode;
    }
    if let Some(path) = decision_path {
        policy.decision_path = path;
    }
}

fn with_port(bind_address: &str, port: u16) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("127.0.0.1");
    format!("{}:{}", host, port)
}

async fn serve_command(config: Config) -> Result<()> {
    let telemetry = carinfo_server::telemetry::init(&config.logging, "carinfo")?;

    println!(
        "{} Starting CarInfo server on {} (policy mode: {})...",
        "→".blue(),
        config.server.bind_address,
        config.policy.effective_mode()
    );

    let result = carinfo_server::serve(config).await;
    telemetry.shutdown();
    result
}

async fn decide_command(
    policy: &PolicyConfig,
    resource: String,
    action: String,
    subject: Option<String>,
    format: String,
) -> Result<()> {
    let authorizer = policy
        .build_authorizer()
        .context("Invalid policy configuration")?;

    let segments: Vec<&str> = resource.split('/').filter(|s| !s.is_empty()).collect();
    let input = DecisionInput::new(&segments, subject.as_deref(), &action.to_uppercase());
    let allowed = authorizer.decide(&input).await;

    match format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "input": input,
                "mode": authorizer.mode_name(),
                "allowed": allowed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            let status = if allowed {
                "ALLOWED".green()
            } else {
                "DENIED".red()
            };

            println!("\n{} Authorization Decision", "═".blue().bold());
            println!("{} Decision: {}", "▸".blue(), status);
            println!("{} Mode: {}", "▸".blue(), authorizer.mode_name());
            println!("{} Resource: {:?}", "▸".blue(), input.resource);
            println!(
                "{} Subject: {}",
                "▸".blue(),
                input.subject.as_deref().unwrap_or("(none)")
            );
            println!("{} Action: {}", "▸".blue(), input.action);
        }
    }

    if !allowed {
        std::process::exit(2);
    }
    Ok(())
}

fn inspect_command(data: PathBuf, format: String) -> Result<()> {
    let store = FileStore::new(&data);
    let snapshot = store
        .load()
        .with_context(|| format!("Failed to load {}", data.display()))?;

    let next_id = next_identifier(&snapshot.cars);
    let orphaned = snapshot.orphaned_statuses();

    match format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "path": data.display().to_string(),
                "cars": snapshot.cars.len(),
                "statuses": snapshot.statuses.len(),
                "next_identifier": next_id,
                "orphaned_statuses": orphaned,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("\n{} Snapshot {}", "═".blue().bold(), data.display());
            println!("{} Cars: {}", "▸".blue(), snapshot.cars.len());
            println!("{} Statuses: {}", "▸".blue(), snapshot.statuses.len());
            println!("{} Next identifier: {}", "▸".blue(), next_id);

            if orphaned.is_empty() {
                println!("{} Every status belongs to a car", "✓".green());
            } else {
                println!(
                    "{} Statuses without a car: {}",
                    "✗".red(),
                    orphaned.join(", ")
                );
            }
        }
    }

    Ok(())
}
