use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FacebookCredentials {
    pub page_access_token: String,
    pub page_id: String,
}

#[derive(Debug, Clone)]
pub struct InstagramCredentials {
    pub access_token: String,
    pub business_account_id: String,
}

#[derive(Debug, Clone)]
pub struct WordPressCredentials {
    pub base_url: String,
    pub username: String,
    pub application_password: String,
}

/// Process-wide settings, read once at startup.
///
/// Platform credentials are optional; a publisher built without them reports
/// itself as misconfigured when asked to post.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub output_dir: PathBuf,
    pub facebook: Option<FacebookCredentials>,
    pub instagram: Option<InstagramCredentials>,
    pub wordpress: Option<WordPressCredentials>,
}

impl Config {
    pub fn from_env() -> Self {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let facebook = match (var("FB_PAGE_ACCESS_TOKEN"), var("FB_PAGE_ID")) {
            (Some(page_access_token), Some(page_id)) => Some(FacebookCredentials {
                page_access_token,
                page_id,
            }),
            _ => None,
        };

        let instagram = match (var("IG_ACCESS_TOKEN"), var("IG_BUSINESS_ACCOUNT_ID")) {
            (Some(access_token), Some(business_account_id)) => Some(InstagramCredentials {
                access_token,
                business_account_id,
            }),
            _ => None,
        };

        let wordpress = match (
            var("WP_BASE_URL"),
            var("WP_USERNAME"),
            var("WP_APPLICATION_PASSWORD"),
        ) {
            (Some(base_url), Some(username), Some(application_password)) => {
                Some(WordPressCredentials {
                    base_url,
                    username,
                    application_password,
                })
            }
            _ => None,
        };

        Self {
            environment: var("ENV").unwrap_or_else(|| "development".to_string()),
            output_dir: PathBuf::from(var("OUTPUT_DIR").unwrap_or_else(|| "output".to_string())),
            facebook,
            instagram,
            wordpress,
        }
    }

    /// Create the output directory if needed and return it
    pub fn ensure_output_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;
        Ok(self.output_dir.clone())
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/publishing-toolkit/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("publishing-toolkit").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

/// Non-empty environment variable
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
