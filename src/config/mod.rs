use std::env;
use std::time::Duration;

/// Client configuration for talking to the claims API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the claims API (default: "http://localhost:8000")
    pub api_base_url: String,

    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Maximum number of photos staged for one claim (default: 10)
    pub max_files: usize,

    /// Maximum photo size in bytes (default: 10 MB)
    pub max_file_size: usize,

    /// Bearer token restored from a previous login
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            max_files: 10,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            api_base_url: env::var("CLAIMDESK_API_URL").unwrap_or(default.api_base_url),

            request_timeout_secs: env::var("CLAIMDESK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.request_timeout_secs),

            max_files: env::var("CLAIMDESK_MAX_FILES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files),

            max_file_size: env::var("CLAIMDESK_MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            auth_token: env::var("CLAIMDESK_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }

    /// Create config for a local API with relaxed limits
    pub fn development() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 120,
            max_files: 50,
            max_file_size: 50 * 1024 * 1024,
            auth_token: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_files: self.max_files,
            max_file_size: self.max_file_size,
        }
    }
}

/// Limits applied when staging photos locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        ClientConfig::default().upload_limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.max_files, 10);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.max_files, 50);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_upload_limits_follow_config() {
        let config = ClientConfig {
            max_files: 4,
            ..ClientConfig::default()
        };
        assert_eq!(config.upload_limits().max_files, 4);
        assert_eq!(UploadLimits::default().max_files, 10);
    }

    #[test]
    fn test_from_env_token() {
        unsafe { env::set_var("CLAIMDESK_TOKEN", "  abc123  ") };
        let config = ClientConfig::from_env();
        unsafe { env::remove_var("CLAIMDESK_TOKEN") };
        assert_eq!(config.auth_token.as_deref(), Some("abc123"));
    }
}
