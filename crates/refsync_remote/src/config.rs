//! Configuration for the remote client.

use std::time::Duration;
use tracing::warn;

/// Configuration for remote calls.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Endpoint base URL, without a trailing `/` or method segment.
    pub endpoint: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Retry configuration for transport faults.
    pub retry: RetryConfig,
    /// Delay inserted between page requests.
    pub page_delay: Duration,
    /// Folder that receives uploaded attachments.
    pub upload_folder_id: String,
}

impl RemoteConfig {
    /// Creates a configuration for `endpoint`.
    ///
    /// A trailing `/` is removed, as is a method segment pasted after the
    /// webhook credentials (`.../rest/1/token/lists.field.get`).
    pub fn new(endpoint: impl AsRef<str>) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint.as_ref()),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            page_delay: Duration::from_millis(100),
            upload_folder_id: "200931".to_string(),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the delay between page requests.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Sets the attachment upload folder.
    pub fn with_upload_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.upload_folder_id = folder_id.into();
        self
    }

    /// Returns the URL for `method`.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new("")
    }
}

fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');

    if let Some((base, rest)) = trimmed.split_once("/rest/") {
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() > 2 {
            let cleaned = format!("{base}/rest/{}/{}", segments[0], segments[1]);
            warn!(endpoint = %cleaned, "Stripped method segment from endpoint");
            return cleaned;
        }
    }

    trimmed.to_string()
}

/// Configuration for retrying transport faults.
///
/// Backoff is linear: the wait after the n-th failed attempt is
/// `base_delay * n`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay unit for linear backoff.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with a one second base delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Returns the delay to wait after `failed_attempts` attempts have failed.
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        self.base_delay.saturating_mul(failed_attempts)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_config_builder() {
        let config = RemoteConfig::new("https://crm.example.com/rest/1/abc/")
            .with_timeout(Duration::from_secs(5))
            .with_page_delay(Duration::ZERO)
            .with_upload_folder("42");

        assert_eq!(config.endpoint, "https://crm.example.com/rest/1/abc");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.upload_folder_id, "42");
        assert_eq!(
            config.method_url("user.get"),
            "https://crm.example.com/rest/1/abc/user.get"
        );
    }

    #[test]
    fn endpoint_method_segment_is_stripped() {
        let config = RemoteConfig::new("https://crm.example.com/rest/1/abc/lists.field.get/");
        assert_eq!(config.endpoint, "https://crm.example.com/rest/1/abc");
    }

    #[test]
    fn endpoint_without_rest_prefix_is_kept() {
        let config = RemoteConfig::new("http://127.0.0.1:8080/api");
        assert_eq!(config.endpoint, "http://127.0.0.1:8080/api");
    }

    #[test]
    fn retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }

    #[test]
    fn retry_delay_is_linear() {
        let config = RetryConfig::new(5).with_base_delay(Duration::from_millis(100));

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(400));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryConfig::new(0).attempts(), 1);
    }
}
