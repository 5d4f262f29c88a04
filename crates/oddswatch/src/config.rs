use std::time::Duration;

pub const DEFAULT_PROXY_ENDPOINT: &str = "https://scraping.narf.ai/api/v1/";

/// Credentials and options for the scraping proxy that fetches pages on our behalf.
#[derive(Clone)]
pub struct ProxyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub render_js: bool,
}

impl ProxyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            api_key: api_key.into(),
            render_js: false,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_render_js(mut self, render_js: bool) -> Self {
        self.render_js = render_js;
        self
    }
}

// Keeps the api key out of logs.
impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("render_js", &self.render_js)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub proxy: Option<ProxyConfig>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub meetings_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            proxy: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            meetings_ttl: Duration::from_secs(600),
        }
    }
}

impl FetchConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Number of attempts per page; zero is treated as one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_meetings_ttl(mut self, meetings_ttl: Duration) -> Self {
        self.meetings_ttl = meetings_ttl;
        self
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}
