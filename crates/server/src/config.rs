//! Gateway configuration

/// Settings for the web service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix every route is mounted under, `/` for none
    pub base: String,

    /// Address the server binds to
    pub addr: String,

    /// Build version echoed by `/version` and injected into the shell
    pub version: String,

    /// Basic credentials. Authorization is only enforced when both are set.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Display name of this gateway
    pub hostname: String,

    /// Opt out of the anonymous usage pulse
    pub no_analytics: bool,

    /// Where usage samples are posted; logged locally when unset
    pub analytics_endpoint: Option<String>,

    /// Development mode: no CSP header, lenient manifest loading
    pub dev: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: "/".to_string(),
            addr: "0.0.0.0:8080".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            username: None,
            password: None,
            hostname: String::new(),
            no_analytics: false,
            analytics_endpoint: None,
            dev: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path, normalized to `/prefix` form
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = normalize_base(base);
        self
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn without_analytics(mut self) -> Self {
        self.no_analytics = true;
        self
    }

    pub fn with_analytics_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.analytics_endpoint = Some(endpoint.into());
        self
    }

    /// Whether credentials are configured
    pub fn secured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Base path as a prefix: empty when mounted at the root
    pub fn prefix(&self) -> &str {
        if self.base == "/" { "" } else { &self.base }
    }

    /// Absolute path of `suffix` under the base path
    pub fn path(&self, suffix: &str) -> String {
        let suffix = suffix.trim_matches('/');
        match (self.prefix(), suffix) {
            ("", "") => "/".to_string(),
            (prefix, "") => prefix.to_string(),
            (prefix, suffix) => format!("{}/{}", prefix, suffix),
        }
    }

    /// Request path relative to the base, without a leading slash
    ///
    /// Returns `None` when the path lies outside the base.
    pub fn strip_base<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix())?;
        if rest.is_empty() {
            return Some("");
        }
        rest.strip_prefix('/')
    }
}

/// Normalize a base path: leading slash, no trailing slash, `/` when empty
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// A remote agent given as `URL` or `URL|NAME`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub endpoint: String,
    pub name: String,
}

impl RemoteHost {
    /// Parse `URL|NAME`; the name defaults to the URL's host part
    pub fn parse(value: &str) -> Option<Self> {
        let (endpoint, name) = match value.split_once('|') {
            Some((endpoint, name)) => (endpoint.trim(), name.trim().to_string()),
            None => {
                let endpoint = value.trim();
                let authority = endpoint
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(endpoint);
                let host = authority
                    .split(['/', ':'])
                    .next()
                    .unwrap_or_default()
                    .to_string();
                (endpoint, host)
            }
        };

        if endpoint.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            endpoint: endpoint.to_string(),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("/"), "/");
        assert_eq!(normalize_base(""), "/");
        assert_eq!(normalize_base("logs"), "/logs");
        assert_eq!(normalize_base("/logs/"), "/logs");
        assert_eq!(normalize_base(" /a/b/ "), "/a/b");
    }

    #[test]
    fn test_path_at_root() {
        let config = Config::new();
        assert_eq!(config.prefix(), "");
        assert_eq!(config.path("login"), "/login");
        assert_eq!(config.path("/api/events/stream"), "/api/events/stream");
        assert_eq!(config.path(""), "/");
    }

    #[test]
    fn test_path_under_base() {
        let config = Config::new().with_base("/logs/");
        assert_eq!(config.base, "/logs");
        assert_eq!(config.path("login"), "/logs/login");
        assert_eq!(config.path("/version"), "/logs/version");
        assert_eq!(config.path(""), "/logs");
    }

    #[test]
    fn test_strip_base() {
        let root = Config::new();
        assert_eq!(root.strip_base("/"), Some(""));
        assert_eq!(root.strip_base("/app.js"), Some("app.js"));

        let config = Config::new().with_base("/logs");
        assert_eq!(config.strip_base("/logs/"), Some(""));
        assert_eq!(config.strip_base("/logs"), Some(""));
        assert_eq!(config.strip_base("/logs/assets/app.js"), Some("assets/app.js"));
        assert_eq!(config.strip_base("/other/app.js"), None);
        assert_eq!(config.strip_base("/logsx"), None);
    }

    #[test]
    fn test_secured() {
        assert!(!Config::new().secured());
        assert!(Config::new().with_credentials("admin", "secret").secured());

        let mut half = Config::new();
        half.username = Some("admin".to_string());
        assert!(!half.secured());
    }

    #[test]
    fn test_remote_host_parse() {
        assert_eq!(
            RemoteHost::parse("tcp://10.0.0.2:2375|build-box"),
            Some(RemoteHost {
                endpoint: "tcp://10.0.0.2:2375".to_string(),
                name: "build-box".to_string(),
            })
        );
        assert_eq!(
            RemoteHost::parse("tcp://10.0.0.2:2375").unwrap().name,
            "10.0.0.2"
        );
        assert_eq!(RemoteHost::parse("https://docker.internal/").unwrap().name, "docker.internal");
        assert!(RemoteHost::parse("").is_none());
        assert!(RemoteHost::parse("tcp://x|").is_none());
    }
}
