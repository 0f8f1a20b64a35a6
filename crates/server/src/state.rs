use std::sync::Arc;
use tunecast_core::{Config, Engine, MediaDiscovery, MediaLibrary, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    library: Arc<dyn MediaLibrary>,
    engine: Arc<Engine>,
    discovery: Arc<MediaDiscovery>,
}

impl AppState {
    pub fn new(
        config: Config,
        library: Arc<dyn MediaLibrary>,
        engine: Arc<Engine>,
        discovery: Arc<MediaDiscovery>,
    ) -> Self {
        Self {
            config,
            library,
            engine,
            discovery,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn library(&self) -> &dyn MediaLibrary {
        self.library.as_ref()
    }

    pub fn engine(&self) -> &Engine {
        self.engine.as_ref()
    }

    pub fn discovery(&self) -> &MediaDiscovery {
        self.discovery.as_ref()
    }
}
