mod api;
mod collectors;
mod config;
mod reporter;

use api::ApiClient;
use clap::Parser;
use config::Config;
use reporter::{Reporter, RoomCheck, StopReason};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "interview-agent")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    room: Option<String>,
    #[arg(long)]
    session_key: Option<String>,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Ok(url) = std::env::var("SERVER_URL") {
        if !url.trim().is_empty() {
            cfg.server_url = url;
        }
    }
    if let Some(server) = cli.server {
        cfg.server_url = server;
    }
    if let Some(room) = cli.room {
        cfg.room_id = Some(room);
    }
    if let Some(key) = cli.session_key {
        cfg.session_key = Some(key);
    }

    if let Err(err) = cfg.validate() {
        error!(error = %err, "invalid configuration");
        std::process::exit(1);
    }

    let room_id = match resolve_required(cfg.room_id.clone(), "Room ID") {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "room id is required");
            std::process::exit(1);
        }
    };
    let session_key = match resolve_required(cfg.session_key.clone(), "Session Key") {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "session key is required");
            std::process::exit(1);
        }
    };

    let api = match ApiClient::new(
        &cfg.server_url,
        &session_key,
        Duration::from_secs(cfg.request_timeout_secs),
    ) {
        Ok(api) => api,
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            std::process::exit(1);
        }
    };

    info!(
        server = %cfg.server_url,
        room = %room_id,
        interval_secs = cfg.poll_interval_secs,
        "starting interview-agent"
    );

    let mut reporter = Reporter::new(&cfg, api, room_id.clone());

    match reporter.check_room().await {
        RoomCheck::Gone => {
            error!(room = %room_id, "room not found, check the room id");
            std::process::exit(1);
        }
        RoomCheck::Status(_) => info!(room = %room_id, "room found, monitoring begins"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut reporter_task = tokio::spawn(async move { reporter.run(shutdown_rx).await });

    let reason = tokio::select! {
        finished = &mut reporter_task => finished.unwrap_or(StopReason::Cancelled),
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, stopping after the current tick");
            let _ = shutdown_tx.send(true);
            reporter_task.await.unwrap_or(StopReason::Cancelled)
        }
    };

    if reason == StopReason::TooManyErrors {
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// Configured value when present, otherwise a stdin prompt.
fn resolve_required(configured: Option<String>, label: &str) -> Result<String, io::Error> {
    if let Some(value) = configured {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim();
    if answer.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{label} must not be empty"),
        ));
    }
    Ok(answer.to_string())
}
