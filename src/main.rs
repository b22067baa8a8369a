use anyhow::Result;
use arc_swap::ArcSwap;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use portcullis::{
    api::{self, rate_limit},
    config::{Config, RuntimeSettings},
    db,
    housekeeping::Housekeeping,
    logging,
    notifications::SmtpMailer,
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "portcullis")]
#[command(author, version, about = "Session and one-time-token identity server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "portcullis.toml", env = "PORTCULLIS_CONFIG")]
    config: PathBuf,

    /// Override the listen port
    #[arg(short, long, env = "PORTCULLIS_PORT")]
    port: Option<u16>,

    /// Override log level
    #[arg(short, long, env = "PORTCULLIS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Override the database URL
    #[arg(long, env = "PORTCULLIS_DATABASE_URL")]
    database_url: Option<String>,
}

/// How often expired sessions and tokens are purged
const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(url) = cli.database_url {
        config.server.database_url = url;
    }

    let log_level = logging::init(&config.logging.level);

    tracing::info!("Starting Portcullis v{}", env!("CARGO_PKG_VERSION"));
    if !config.server.secure_cookies {
        tracing::warn!("Session cookies are not marked Secure; use only for plain-HTTP development");
    }

    let pool = db::init(&config.server.database_url).await?;

    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        db::ensure_admin_user(&pool, email, password).await?;
    }

    let settings = Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(&config)));
    if !settings.load().email.is_configured() {
        tracing::warn!("SMTP is not configured; activation and reset emails will not be sent");
    }
    let mailer = Arc::new(SmtpMailer::new(settings.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let cleanup_interval = config.rate_limit.cleanup_interval;
    let state = Arc::new(AppState::new(config, pool, settings, mailer, log_level));

    rate_limit::spawn_cleanup_task(state.rate_limiter.clone(), cleanup_interval);
    tokio::spawn(Housekeeping::new(state.sessions.clone(), state.tokens.clone()).run(PURGE_INTERVAL));

    let app = api::create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
