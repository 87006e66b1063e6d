use crate::config::constants;
use std::time::Duration;

/// Connection and scheduling settings for config sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Base URL of the key-value store
    pub store_url: String,
    /// Namespace under which pipelines are stored, without trailing `/`
    pub key_prefix: String,
    pub call_timeout: Duration,
    pub refresh_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            store_url: constants::DEFAULT_STORE_URL.to_string(),
            key_prefix: constants::STORE_KEY_PREFIX.to_string(),
            call_timeout: constants::STORE_CALL_TIMEOUT,
            refresh_interval: constants::REFRESH_INTERVAL,
        }
    }
}

impl SyncSettings {
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Store key of a pipeline
    pub fn key_for(&self, pipeline: &str) -> String {
        format!("{}/{}", self.key_prefix, pipeline)
    }

    /// Pipeline name of a store key, `None` for keys outside the namespace
    pub fn name_for<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}
