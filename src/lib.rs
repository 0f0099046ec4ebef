//! Classbank Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod presence;
pub mod repositories;
pub mod services;
pub mod store;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use presence::PresenceRouter;
use repositories::*;
use services::*;
use std::sync::Arc;
use store::DocumentStore;

/// Application state containing all repositories and services
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub profiles: Arc<ProfileRepository>,
    pub threads: Arc<ThreadRepository>,
    pub presence: Arc<PresenceRouter>,
    pub reconciliation: Arc<ReconciliationService>,
    pub scheduler: Arc<RecurringScheduler>,
    pub ledger: Arc<LedgerService>,
    pub time_travel: Arc<TimeTravelService>,
    pub messaging: Arc<MessagingService>,
}

impl AppState {
    /// Create a new AppState wired over the given document store
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        let profiles = Arc::new(ProfileRepository::new(store.clone()));
        let threads = Arc::new(ThreadRepository::new(store.clone()));
        let presence = Arc::new(PresenceRouter::new());

        let reconciliation = Arc::new(ReconciliationService::new(
            profiles.clone(),
            presence.clone(),
        ));
        let scheduler = Arc::new(RecurringScheduler::new(
            profiles.clone(),
            reconciliation.clone(),
            config.scheduler.clone(),
        ));
        let ledger = Arc::new(LedgerService::new(
            profiles.clone(),
            reconciliation.clone(),
            scheduler.clone(),
        ));
        let time_travel = Arc::new(TimeTravelService::new(
            profiles.clone(),
            reconciliation.clone(),
        ));
        let messaging = Arc::new(MessagingService::new(
            profiles.clone(),
            threads.clone(),
            presence.clone(),
        ));

        Self {
            config,
            store,
            profiles,
            threads,
            presence,
            reconciliation,
            scheduler,
            ledger,
            time_travel,
            messaging,
        }
    }
}
