//! Collaborators injected into every controller.

use std::sync::Arc;

use tether_transport::{Codec, Runtime, StaticViews, ViewRenderer};

use crate::config::ControllerConfig;

/// Everything a controller needs from the outside, built once by the
/// composition root and shared by all pooled units.
pub struct ControllerEnv {
    pub runtime: Arc<dyn Runtime>,
    pub codec: Arc<dyn Codec>,
    pub views: Arc<dyn ViewRenderer>,
    pub config: ControllerConfig,
}

impl ControllerEnv {
    pub fn new(runtime: Arc<dyn Runtime>, codec: Arc<dyn Codec>) -> Self {
        Self {
            runtime,
            codec,
            views: Arc::new(StaticViews::default()),
            config: ControllerConfig::default(),
        }
    }

    pub fn with_views(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = views;
        self
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }
}
