use std::sync::Arc;

use colloquy_engine::Engine;
use colloquy_store::Store;

use crate::config::Config;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(config: Config, store: Store, engine: Engine) -> Self {
        Self {
            config: Arc::new(config),
            store,
            engine: Arc::new(engine),
        }
    }
}
