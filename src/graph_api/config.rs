use std::time::Duration;

/// Default Graph API host
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
/// Default host of the legacy `/method/<name>` endpoint
pub const DEFAULT_LEGACY_URL: &str = "https://api.facebook.com";
/// Default authorization dialog
pub const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com/dialog/oauth";
/// Default bound on pages produced by a paginator
pub const DEFAULT_MAX_PAGES: usize = 3;

/// Graph API client options
///
/// Resolved once when a client is built; every call made through that
/// client sees the same values.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphApiConfig {
    /// Base URL of the Graph API, also used for the OAuth endpoints
    pub graph_url: String,

    /// Base URL of the legacy REST API that serves FQL queries
    pub legacy_url: String,

    /// Authorization dialog URL used by `auth_url`
    pub dialog_url: String,

    /// Per-call timeout bounding each blocking network read. Default: none
    pub timeout: Option<Duration>,

    /// Maximum number of pages a paginator yields. Default: 3
    pub max_pages: usize,
}

impl Default for GraphApiConfig {
    fn default() -> Self {
        Self {
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            legacy_url: DEFAULT_LEGACY_URL.to_string(),
            dialog_url: DEFAULT_DIALOG_URL.to_string(),
            timeout: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl GraphApiConfig {
    /// Create a new GraphApiConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from defaults overridden by environment variables
    ///
    /// Reads `GRAPH_API_URL`, `GRAPH_API_LEGACY_URL`,
    /// `GRAPH_API_TIMEOUT_SECS` and `GRAPH_API_MAX_PAGES`. Values that do not
    /// parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("GRAPH_API_URL") {
            config.graph_url = url;
        }
        if let Some(url) = lookup("GRAPH_API_LEGACY_URL") {
            config.legacy_url = url;
        }
        if let Some(raw) = lookup("GRAPH_API_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(e) => tracing::warn!("Ignoring GRAPH_API_TIMEOUT_SECS={:?}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("GRAPH_API_MAX_PAGES") {
            match raw.trim().parse::<usize>() {
                Ok(pages) => config.max_pages = pages,
                Err(e) => tracing::warn!("Ignoring GRAPH_API_MAX_PAGES={:?}: {}", raw, e),
            }
        }

        config
    }

    /// Set the Graph API base URL (builder pattern)
    pub fn with_graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = url.into();
        self
    }

    /// Set the legacy REST API base URL (builder pattern)
    pub fn with_legacy_url(mut self, url: impl Into<String>) -> Self {
        self.legacy_url = url.into();
        self
    }

    /// Set the authorization dialog URL (builder pattern)
    pub fn with_dialog_url(mut self, url: impl Into<String>) -> Self {
        self.dialog_url = url.into();
        self
    }

    /// Set the per-call timeout (builder pattern)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the page bound for paginators (builder pattern)
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Join a path onto the Graph API base URL
    pub(crate) fn graph_endpoint(&self, path: &str) -> String {
        join_url(&self.graph_url, path)
    }

    /// Join a path onto the legacy REST API base URL
    pub(crate) fn legacy_endpoint(&self, path: &str) -> String {
        join_url(&self.legacy_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
