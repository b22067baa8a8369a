pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod housekeeping;
pub mod logging;
pub mod notifications;
pub mod ui;

pub use db::DbPool;

use arc_swap::ArcSwap;
use config::{Config, RuntimeSettings};
use std::sync::Arc;
use std::time::Duration;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{SessionManager, TokenManager};
use crate::logging::LogLevelControl;
use crate::notifications::Mailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenManager,
    pub sessions: SessionManager,
    pub rate_limiter: Arc<RateLimiter>,
    /// Values editable on the configuration page
    pub settings: Arc<ArcSwap<RuntimeSettings>>,
    pub mailer: Arc<dyn Mailer>,
    pub log_level: LogLevelControl,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        settings: Arc<ArcSwap<RuntimeSettings>>,
        mailer: Arc<dyn Mailer>,
        log_level: LogLevelControl,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let tokens = TokenManager::new(db.clone(), Duration::from_secs(config.auth.token_ttl_secs));
        let sessions =
            SessionManager::new(db.clone(), Duration::from_secs(config.auth.session_ttl_secs));
        Self {
            config,
            db,
            tokens,
            sessions,
            rate_limiter,
            settings,
            mailer,
            log_level,
        }
    }

    /// Snapshot of the runtime settings
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        self.settings.load_full()
    }
}
