use std::sync::Arc;

use chrono::Duration;

use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::ideas::recommend::Recommender;
use crate::jobs::skills::SkillCatalog;
use crate::store::Stores;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub sessions: SessionStore,
    pub recommender: Recommender,
    /// Loaded once at startup; read-only afterwards.
    pub skills: Arc<SkillCatalog>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, recommender: Recommender, skills: SkillCatalog) -> Self {
        Self {
            stores: Stores::open(&config.data_dir),
            sessions: SessionStore::new(Duration::minutes(config.session_ttl_minutes)),
            recommender,
            skills: Arc::new(skills),
            config,
        }
    }
}
