use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::auth::session::DEFAULT_SESSION_TTL_MINUTES;

pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Application configuration loaded from environment variables.
/// Every variable is optional; a missing Gemini key switches recommendations to the
/// offline fallback instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub skills_csv: PathBuf,
    pub skills_file: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub port: u16,
    /// Idle minutes before a login session expires.
    pub session_ttl_minutes: i64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let data_dir = PathBuf::from(optional_env("DATA_DIR").unwrap_or_else(|| "data".into()));
        let skills_csv = optional_env("SKILLS_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("skills_companies_packages.csv"));
        let skills_file = optional_env("SKILLS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("skills_jobs.json"));

        Ok(Config {
            upload_dir: PathBuf::from(
                optional_env("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()),
            ),
            skills_csv,
            skills_file,
            data_dir,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_api_url: optional_env("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            session_ttl_minutes: optional_env("SESSION_TTL_MINUTES")
                .map(|v| v.parse::<i64>())
                .transpose()
                .context("SESSION_TTL_MINUTES must be a whole number of minutes")?
                .unwrap_or(DEFAULT_SESSION_TTL_MINUTES),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Configuration rooted at `root`, used by tests that need isolated directories.
    #[cfg(test)]
    pub fn for_root(root: &std::path::Path) -> Self {
        let data_dir = root.join("data");
        Config {
            skills_csv: data_dir.join("skills_companies_packages.csv"),
            skills_file: data_dir.join("skills_jobs.json"),
            upload_dir: root.join("uploads"),
            data_dir,
            gemini_api_key: None,
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            port: 0,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            rust_log: "debug".to_string(),
        }
    }
}

/// Reads an env var, treating unset and blank values alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
