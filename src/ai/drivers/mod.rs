pub mod openai;
pub mod xai;

use crate::ai::driver::Driver;
use crate::ai::registry::{DriverFactory, ResolveError};
use std::sync::Arc;
use std::time::Duration;

/// Builds the two driver types this crate ships (spec §4.6 "Supported
/// ai_provider types: xai, openai (and any future driver registered)").
pub struct DefaultDriverFactory {
    client: reqwest::Client,
}

impl DefaultDriverFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DriverFactory for DefaultDriverFactory {
    fn build(&self, provider_type: &str, base_url: Option<&str>, api_key: &str, _timeout: Duration) -> Result<Arc<dyn Driver>, ResolveError> {
        match provider_type {
            "openai" => Ok(Arc::new(openai::OpenAiDriver::new(self.client.clone(), base_url, api_key))),
            "xai" => Ok(Arc::new(xai::XaiDriver::new(self.client.clone(), base_url, api_key))),
            other => Err(ResolveError::UnsupportedProviderType(other.to_string())),
        }
    }
}
