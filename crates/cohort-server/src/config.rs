use std::path::PathBuf;

use anyhow::{Context, bail};

use cohort_api::assistant::AssistantConfig;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Server settings, read from `COHORT_*` environment variables.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    /// `None` unless `COHORT_AI_API_KEY` is set.
    pub assistant: Option<AssistantConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("COHORT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("COHORT_JWT_SECRET is unset or still a placeholder");
        }

        let port = var("COHORT_PORT", "3000")
            .parse()
            .context("COHORT_PORT must be a port number")?;

        let assistant = match get("COHORT_AI_API_KEY").filter(|k| !k.is_empty()) {
            Some(api_key) => Some(AssistantConfig {
                base_url: var("COHORT_AI_BASE_URL", "https://api.openai.com/v1"),
                api_key,
                model: var("COHORT_AI_MODEL", "gpt-4o-mini"),
                timeout_secs: var("COHORT_AI_TIMEOUT_SECS", "30")
                    .parse()
                    .context("COHORT_AI_TIMEOUT_SECS must be a number of seconds")?,
            }),
            None => None,
        };

        Ok(Self {
            host: var("COHORT_HOST", "0.0.0.0"),
            port,
            db_path: var("COHORT_DB_PATH", "cohort.db").into(),
            jwt_secret,
            upload_dir: var("COHORT_UPLOAD_DIR", "./uploads").into(),
            assistant,
        })
    }
}
