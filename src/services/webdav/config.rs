use crate::errors::WagonError;

/// Prefix some repository definitions put in front of the real URL
const DAV_URL_MARKER: &str = "dav:";

/// WebDAV repository configuration
#[derive(Debug, Clone)]
pub struct WebDAVConfig {
    pub repository_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl WebDAVConfig {
    /// Creates a new anonymous configuration with the default timeout
    pub fn new(repository_url: String) -> Self {
        Self {
            repository_url,
            username: None,
            password: None,
            timeout_seconds: 60,
        }
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), WagonError> {
        let url = self.webdav_url();

        if url.is_empty() {
            return Err(WagonError::ConfigurationInvalid {
                details: "Repository URL cannot be empty".to_string(),
            });
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WagonError::ConfigurationInvalid {
                details: format!("Repository URL must start with http:// or https://: {}", url),
            });
        }

        if let Err(e) = url::Url::parse(&url) {
            return Err(WagonError::ConfigurationInvalid {
                details: format!("Invalid repository URL '{}': {}", url, e),
            });
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(WagonError::ConfigurationInvalid {
                details: "Username and password must be provided together".to_string(),
            });
        }

        if self.timeout_seconds == 0 {
            return Err(WagonError::ConfigurationInvalid {
                details: "Timeout must be at least one second".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the repository URL used for requests, without the `dav:`
    /// marker and without a trailing slash
    pub fn webdav_url(&self) -> String {
        let url = self.repository_url.trim();
        let url = url.strip_prefix(DAV_URL_MARKER).unwrap_or(url);
        url.trim_end_matches('/').to_string()
    }

    /// Path component of the repository URL, as the server reports it in hrefs
    pub fn base_path(&self) -> String {
        url::Url::parse(&self.webdav_url())
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    /// Gets the timeout duration
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}
