mod db_commands;

use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    chatline_completion::CompletionClient,
    chatline_config::ChatlineConfig,
    chatline_dispatch::{DispatchClient, DispatchConfig},
    chatline_gateway::build_app,
    chatline_pipeline::{Pipeline, spawn_worker},
    chatline_store::Store,
};

#[derive(Parser)]
#[command(name = "chatline", about = "Chatline — WhatsApp auto-reply gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file path (overrides discovery in ./ and ~/.config/chatline/).
    #[arg(long, global = true, env = "CHATLINE_CONFIG")]
    config: Option<std::path::PathBuf>,

    // Server arguments (used when no subcommand is provided, or with `serve`)
    /// Address to bind to (overrides config value).
    #[arg(long, global = true, env = "CHATLINE_BIND")]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true, env = "CHATLINE_PORT")]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default when no subcommand is provided).
    Serve,
    /// Send a message through the WhatsApp Cloud API.
    Send {
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
    /// Database management (migrate, reset).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ChatlineConfig> {
    match cli.config {
        Some(ref path) => Ok(chatline_config::load_config(path)?),
        None => Ok(chatline_config::discover_and_load()),
    }
}

fn completion_client(config: &ChatlineConfig) -> CompletionClient {
    CompletionClient::new(chatline_completion::CompletionConfig {
        api_base: config.completion.api_base.clone(),
        api_key: config.completion.api_key.clone(),
        model: config.completion.model.clone(),
        max_tokens: config.completion.max_tokens,
        temperature: config.completion.temperature,
    })
}

fn dispatch_client(config: &ChatlineConfig) -> DispatchClient {
    DispatchClient::new(DispatchConfig {
        api_base: config.whatsapp.api_base.clone(),
        api_version: config.whatsapp.api_version.clone(),
        phone_number_id: config.whatsapp.phone_number_id.clone(),
        access_token: config.whatsapp.access_token.clone(),
    })
}

async fn serve(cli: &Cli, config: ChatlineConfig) -> anyhow::Result<()> {
    let store = Store::connect(&config.database.path).await?;
    store.migrate().await?;

    let pipeline = Pipeline::new(
        store,
        Arc::new(completion_client(&config)),
        Arc::new(dispatch_client(&config)),
        config.completion.history_window,
    );
    let (handle, _worker) = spawn_worker(pipeline);

    let app = build_app(Arc::new(handle), config.whatsapp.verify_token.clone());

    // CLI args override config values
    let bind = cli.bind.clone().unwrap_or(config.server.bind);
    let port = cli.port.unwrap_or(config.server.port);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    info!(bind = %bind, port, "webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn send(config: &ChatlineConfig, to: &str, message: &str) -> anyhow::Result<()> {
    let delivery = dispatch_client(config).send_text(to, message).await?;
    if delivery.delivered {
        println!(
            "Delivered to {to} (provider id: {})",
            delivery.provider_id.as_deref().unwrap_or("-")
        );
    } else {
        println!(
            "Not delivered: {}",
            delivery.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "chatline starting");

    let config = load_config(&cli)?;

    match cli.command {
        // Default: start the webhook server when no subcommand is provided
        None | Some(Commands::Serve) => serve(&cli, config).await,
        Some(Commands::Send { to, message }) => send(&config, &to, &message).await,
        Some(Commands::Db { action }) => {
            db_commands::handle_db(action, &config.database.path).await
        },
    }
}
