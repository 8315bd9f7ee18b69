//! Client configuration: API base URL and token file location.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const BASE_URL_ENV: &str = "COURSE_API_BASE_URL";
pub const TOKEN_FILE_ENV: &str = "COURSE_TOKEN_FILE";
const TOKEN_DIR: &str = ".course-client";
const TOKEN_FILE: &str = "storage.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0} (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_file: PathBuf,
}

impl ClientConfig {
    /// Fill in defaults for anything not supplied.
    ///
    /// - `base_url`: default `http://127.0.0.1:8080` (`COURSE_API_BASE_URL`)
    /// - `token_file`: default `$HOME/.course-client/storage.json`
    ///   (`COURSE_TOKEN_FILE`)
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an http(s) URL.
    pub fn resolve(
        base_url: Option<String>,
        token_file: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let token_file = token_file
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| default_token_file(home));
        Ok(Self { base_url, token_file })
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn default_token_file(home: Option<PathBuf>) -> PathBuf {
    home.unwrap_or_default().join(TOKEN_DIR).join(TOKEN_FILE)
}
