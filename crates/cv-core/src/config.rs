//! Configuration types and loading

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the url-encoded document URL in the
/// external viewer template.
pub const DOCUMENT_URL_PLACEHOLDER: &str = "{DOCUMENT_URL}";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Viewer selection and URL assembly
    pub viewer: ViewerConfig,

    /// Rendition cache configuration
    pub cache: CacheConfig,

    /// Message store (attachment source) configuration
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewerConfig {
    /// Per-deployment kill switch; a disabled deployment lists no viewable
    /// attachments and answers the view action with an empty response.
    pub enabled: bool,
    /// Server-side secret mixed into cache keys. Required outside dev mode.
    pub salt_secret: String,
    /// External viewer URL template, must contain `{DOCUMENT_URL}`.
    pub external_viewer_url_template: String,
    /// Relative path of the bundled PDF viewer page.
    pub pdf_viewer_path: String,
    /// Directory the bundled PDF viewer assets are served from.
    pub pdf_viewer_assets_dir: String,
    /// Dev mode relaxes salt validation and switches file URLs to
    /// `dev_mode_file_base_url`.
    pub dev_mode: bool,
    /// Alternate base URL for cached files when serving them from a
    /// different origin than the API host.
    pub dev_mode_file_base_url: Option<String>,
    /// Extension -> MIME overrides applied on top of the built-in map,
    /// e.g. `[("pages", "application/vnd.apple.pages")]`.
    pub extension_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory cached renditions are written to.
    pub root: String,
    /// Public mount path of the cache directory.
    pub public_path: String,
    /// Entries older than this are swept; 0 disables sweeping.
    pub max_age_secs: u64,
    /// Interval between sweep runs.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Root of the message part spool the store reads from.
    pub spool_root: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8090,
            },
            viewer: ViewerConfig {
                enabled: true,
                salt_secret: String::new(),
                external_viewer_url_template:
                    "https://docs.google.com/viewer?url={DOCUMENT_URL}&embedded=true".to_string(),
                pdf_viewer_path: "/viewer/pdfjs/web/viewer.html".to_string(),
                pdf_viewer_assets_dir: "static/pdfjs".to_string(),
                dev_mode: false,
                dev_mode_file_base_url: None,
                extension_overrides: vec![],
            },
            cache: CacheConfig {
                root: "/var/cloudview/cache".to_string(),
                public_path: "/cache".to_string(),
                max_age_secs: 0,
                sweep_interval_secs: 3600,
            },
            store: StoreConfig {
                spool_root: "/var/cloudview/spool".to_string(),
            },
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let parse_bool = |v: String| v == "true" || v == "1" || v == "yes";

        // Server
        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port.parse().unwrap_or(8090);
        }

        // Viewer
        if let Ok(v) = std::env::var("CLOUDVIEW_ENABLED") {
            config.viewer.enabled = parse_bool(v);
        }
        if let Ok(salt) = std::env::var("CLOUDVIEW_SALT_SECRET") {
            config.viewer.salt_secret = salt;
        }
        if let Ok(template) = std::env::var("CLOUDVIEW_VIEWER_URL_TEMPLATE") {
            config.viewer.external_viewer_url_template = template;
        }
        if let Ok(path) = std::env::var("CLOUDVIEW_PDF_VIEWER_PATH") {
            config.viewer.pdf_viewer_path = path;
        }
        if let Ok(dir) = std::env::var("CLOUDVIEW_PDF_VIEWER_ASSETS_DIR") {
            config.viewer.pdf_viewer_assets_dir = dir;
        }
        if let Ok(v) = std::env::var("CLOUDVIEW_DEV_MODE") {
            config.viewer.dev_mode = parse_bool(v);
        }
        if let Ok(url) = std::env::var("CLOUDVIEW_DEV_MODE_FILE_BASE_URL") {
            config.viewer.dev_mode_file_base_url = Some(url);
        }
        if let Ok(overrides) = std::env::var("CLOUDVIEW_EXTENSION_OVERRIDES") {
            config.viewer.extension_overrides = parse_extension_overrides(&overrides)?;
        }

        // Cache
        if let Ok(root) = std::env::var("CLOUDVIEW_CACHE_ROOT") {
            config.cache.root = root;
        }
        if let Ok(path) = std::env::var("CLOUDVIEW_CACHE_PUBLIC_PATH") {
            config.cache.public_path = path;
        }
        if let Ok(v) = std::env::var("CLOUDVIEW_CACHE_MAX_AGE_SECS") {
            config.cache.max_age_secs = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLOUDVIEW_CACHE_MAX_AGE_SECS".into(),
                message: format!("not a number: {v}"),
            })?;
        }
        if let Ok(v) = std::env::var("CLOUDVIEW_CACHE_SWEEP_INTERVAL_SECS") {
            config.cache.sweep_interval_secs =
                v.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "CLOUDVIEW_CACHE_SWEEP_INTERVAL_SECS".into(),
                    message: format!("not a number: {v}"),
                })?;
        }

        // Store
        if let Ok(root) = std::env::var("CLOUDVIEW_SPOOL_ROOT") {
            config.store.spool_root = root;
        }

        Ok(config)
    }

    /// Validate the loaded configuration. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewer.salt_secret.is_empty() && !self.viewer.dev_mode {
            return Err(ConfigError::InvalidValue {
                key: "CLOUDVIEW_SALT_SECRET".into(),
                message: "must be set outside dev mode".into(),
            });
        }
        if !self
            .viewer
            .external_viewer_url_template
            .contains(DOCUMENT_URL_PLACEHOLDER)
        {
            return Err(ConfigError::InvalidValue {
                key: "CLOUDVIEW_VIEWER_URL_TEMPLATE".into(),
                message: format!("missing the {DOCUMENT_URL_PLACEHOLDER} placeholder"),
            });
        }
        if !self.cache.public_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "CLOUDVIEW_CACHE_PUBLIC_PATH".into(),
                message: "must start with /".into(),
            });
        }
        if !self.viewer.pdf_viewer_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "CLOUDVIEW_PDF_VIEWER_PATH".into(),
                message: "must start with /".into(),
            });
        }
        Ok(())
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}

/// Parse `ext=mime,ext=mime` pairs from an environment value.
pub fn parse_extension_overrides(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(ext, mime)| {
                    (ext.trim().to_ascii_lowercase(), mime.trim().to_string())
                })
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "CLOUDVIEW_EXTENSION_OVERRIDES".into(),
                    message: format!("expected ext=mime, got: {pair}"),
                })
        })
        .collect()
}
