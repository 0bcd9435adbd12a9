use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hrag_core::bootstrap::{self, AppContext};
use hrag_core::config::Config;
use hrag_core::rag::QueryRequest;
use hrag_core::research::ResearchEvent;
use hrag_gateway::GatewayServer;
use hrag_memory::ReportId;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "hrag")]
#[command(version, about = "Hybrid retrieval-augmented generation and research agent", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "HRAG_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Start the HTTP gateway.
    Serve,
    /// Index every supported file in the data directory.
    Ingest {
        /// Directory to ingest instead of the configured `ingest.data_dir`.
        #[arg(long, conflicts_with = "file")]
        dir: Option<PathBuf>,
        /// Ingest a single file. In replace mode the index then holds only this file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Answer a question from the indexed documents.
    Query {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Run the searcher, analyst and writer on a topic and save the report.
    Research { topic: String },
    /// List saved research reports, or print one.
    Reports {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    init_subscriber(&config.log_level);
    tracing::debug!(path = %cli.config.display(), "configuration loaded");

    match cli.command {
        Command::Serve => serve(bootstrap::build(config).await?).await,
        Command::Ingest { dir, file } => {
            let app = bootstrap::build(config).await?;
            ingest(&app, dir.as_deref(), file.as_deref()).await
        }
        Command::Query { text, top_k } => query(&bootstrap::build(config).await?, text, top_k).await,
        Command::Research { topic } => research(&bootstrap::build(config).await?, topic).await,
        Command::Reports { id, limit } => reports(&config, id, limit).await,
    }
}

fn init_subscriber(default_level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn serve(app: AppContext) -> anyhow::Result<()> {
    let AppContext {
        config,
        rag,
        research,
        ..
    } = app;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &config.gateway;
    GatewayServer::new(&gateway.bind, gateway.port, rag, research, shutdown_rx)
        .with_auth(gateway.auth_token.clone())
        .with_rate_limit(gateway.rate_limit)
        .with_max_body_size(gateway.max_body_size)
        .serve()
        .await
        .context("gateway failed")
}

async fn ingest(app: &AppContext, dir: Option<&Path>, file: Option<&Path>) -> anyhow::Result<()> {
    let response = match (dir, file) {
        (_, Some(file)) => app
            .rag
            .ingest_file(file)
            .await
            .with_context(|| format!("failed to ingest {}", file.display()))?,
        (Some(dir), None) => app.rag.ingest_dir(dir).await?,
        (None, None) => app.rag.ingest().await?,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn query(app: &AppContext, text: String, top_k: Option<usize>) -> anyhow::Result<()> {
    let response = app.rag.query(QueryRequest { query: text, top_k }).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn research(app: &AppContext, topic: String) -> anyhow::Result<()> {
    let mut events = Arc::clone(&app.research).start(topic)?;
    while let Some(event) = events.recv().await {
        match event {
            ResearchEvent::NodeFinished { node, field, value } => {
                eprintln!("[{node}] finished");
                if field == "report" {
                    println!("{value}");
                }
            }
            ResearchEvent::Saved { report_id } => eprintln!("saved report {report_id}"),
            ResearchEvent::Failed { error, dependency } => match dependency {
                Some(dependency) => bail!("research failed ({dependency}): {error}"),
                None => bail!("research failed: {error}"),
            },
        }
    }
    Ok(())
}

async fn reports(config: &Config, id: Option<i64>, limit: u32) -> anyhow::Result<()> {
    let store = bootstrap::open_store(config).await?;
    if let Some(id) = id {
        let Some(report) = store.get_report(ReportId(id)).await? else {
            bail!("report {id} not found");
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let summaries = store.list_reports(limit).await?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
