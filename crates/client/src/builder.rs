//! Fluent configuration for [`crate::facade::FormatterClient`], following
//! this workspace's builder-collects-env-derived-defaults convention.

use crate::defaults;
use crate::facade::FormatterClient;

#[derive(Debug, Clone)]
pub struct FormatterClientBuilder {
    pub(super) client_version: String,
    pub(super) strict: Option<bool>,
    pub(super) host_retries: Option<u32>,
}

impl Default for FormatterClientBuilder {
    fn default() -> Self {
        FormatterClientBuilder {
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            strict: None,
            host_retries: None,
        }
    }
}

impl FormatterClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Overrides `FMT_BRIDGE_STRICT_HOST` for this instance.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Overrides `FMT_BRIDGE_HOST_RETRIES` for this instance.
    pub fn host_retries(mut self, retries: u32) -> Self {
        self.host_retries = Some(retries.max(defaults::MIN_HOST_RETRIES));
        self
    }

    pub fn build(self) -> FormatterClient {
        let strict = self.strict.unwrap_or_else(defaults::strict_host);
        let host_retries = self.host_retries.unwrap_or_else(defaults::host_retries);
        FormatterClient::from_builder(self.client_version, strict, host_retries)
    }
}
