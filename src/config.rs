//! Client configuration.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default REST origin, including the version prefix.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default bounds applied by [`ClientOptions::default`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientDefaults;

impl ClientDefaults {
    /// Connection establishment timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Whole-request timeout, generous enough for long completions.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Connection, header, and retry options for a [`Client`](crate::Client).
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// REST origin plus version prefix.
    pub base_url: String,
    /// Optional `OpenAI-Organization` header value.
    pub organization: Option<String>,
    /// Optional `OpenAI-Project` header value.
    pub project: Option<String>,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout, covering streamed reads.
    pub request_timeout: Duration,
    /// Retry behavior for transient API failures.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            project: None,
            connect_timeout: ClientDefaults::CONNECT_TIMEOUT,
            request_timeout: ClientDefaults::REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Sets a custom base URL (OpenAI-compatible endpoints, mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end().to_string();
        self
    }

    /// Attaches an organization header to every request.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Attaches a project header to every request.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
