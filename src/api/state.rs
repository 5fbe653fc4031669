//! Shared handler state

use std::sync::Arc;

use crate::config::{Config, ImageConfig, RelayConfig};
use crate::error::{AppError, Result};
use crate::gateway::{ModelGateway, OpenAiCompatClient};
use crate::imaging::ImageNormalizer;
use crate::relay::RelayOptions;

/// Everything a handler needs; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ModelGateway>,
    pub normalizer: ImageNormalizer,
    pub relay: RelayOptions,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>, image: ImageConfig, relay: RelayConfig) -> Self {
        Self {
            gateway,
            normalizer: ImageNormalizer::new(image),
            relay: RelayOptions::from(relay),
        }
    }

    /// Build the state with the HTTP gateway client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OpenAiCompatClient::new(config.gateway.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create gateway client: {}", e)))?;

        Ok(Self::new(Arc::new(client), config.image, config.relay))
    }
}
