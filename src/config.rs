use anyhow::{anyhow, Result};
use std::env;

use crate::services::webdav::WebDAVConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub repository_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            repository_url: env::var("DAV_REPOSITORY_URL")
                .map_err(|_| anyhow!("DAV_REPOSITORY_URL must be set"))?,
            username: env::var("DAV_USERNAME").ok().filter(|s| !s.is_empty()),
            password: env::var("DAV_PASSWORD").ok().filter(|s| !s.is_empty()),
            timeout_seconds: env::var("DAV_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        })
    }

    /// Repository settings for a transfer session
    pub fn webdav_config(&self) -> WebDAVConfig {
        WebDAVConfig {
            repository_url: self.repository_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webdav_config_carries_credentials() {
        let config = Config {
            repository_url: "dav:https://repo.example.com/releases".to_string(),
            username: Some("deployer".to_string()),
            password: Some("secret".to_string()),
            timeout_seconds: 30,
        };

        let webdav = config.webdav_config();
        assert_eq!(webdav.webdav_url(), "https://repo.example.com/releases");
        assert_eq!(webdav.username.as_deref(), Some("deployer"));
        assert_eq!(webdav.timeout_seconds, 30);
        assert!(webdav.validate().is_ok());
    }
}
