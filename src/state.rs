use std::sync::Arc;

use crate::{config::Config, db::Store, predict::ScoringClient};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub scoring: ScoringClient,
}

impl State {
    pub fn new(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Arc<Self>> {
        let scoring = ScoringClient::new(&config.ml_model_url, config.ml_timeout)?;

        Ok(Arc::new(Self {
            config,
            store,
            scoring,
        }))
    }
}

pub type SharedState = Arc<State>;
