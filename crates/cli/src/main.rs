use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server::config::HubConfig;
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kingmode-hub")]
#[command(about = "Phase-based orchestration of remote worker agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON config file; environment variables still take precedence
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (the default)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the worker table
    Agents,
    /// Print the phase definitions and the default plan
    Phases {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = HubConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Serve { port }) => serve(config, port).await,
        Some(Commands::Agents) => {
            agents(&config);
            Ok(())
        }
        Some(Commands::Phases { json }) => phases(&config, json),
        None => serve(config, None).await,
    }
}

async fn serve(mut config: HubConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.port = port;
    }

    let state = AppState::new(&config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!(
        service = %config.service,
        environment = %config.environment,
        agents = config.workers.len(),
        "Listening on {}",
        listener.local_addr()?
    );

    println!();
    println!("{} ({})", config.service, config.environment);
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", config.port);
    println!("  Swagger UI:  http://localhost:{}/swagger-ui", config.port);
    println!("  Workers:     {}", config.workers.len());
    println!();
    println!("  GET  /health");
    println!("  GET  /api/v1/agents");
    println!("  POST /api/v1/kingmode");
    println!("  POST /api/v1/agent/:worker");
    println!("  POST /api/v1/orchestrate");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn agents(config: &HubConfig) {
    let width = config.workers.keys().map(String::len).max().unwrap_or(0);

    println!("Workers ({}):", config.workers.len());
    for (name, url) in &config.workers {
        println!("  {:width$}  {}", name, url, width = width);
    }
}

fn phases(config: &HubConfig, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "plan": config.plan,
            "phases": config.phases,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Plan: {}", config.plan.as_slice().join(" → "));
    println!();
    for phase in &config.phases {
        println!(
            "  {} ({}s): {}",
            phase.name,
            phase.max_duration.as_secs(),
            phase.worker_names.join(", ")
        );
        if let Some(ref description) = phase.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kingmode_hub=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}
