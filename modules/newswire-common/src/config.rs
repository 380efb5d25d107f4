use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI providers. Both optional: with neither set the enrichment engine
    // runs entirely on local fallbacks.
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    // Pipeline defaults (overridable at runtime via update_settings)
    pub scrape_interval_minutes: u64,
    pub max_articles_per_source: usize,
    pub auto_publish: bool,
    pub ai_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            scrape_interval_minutes: parsed_env("SCRAPE_INTERVAL_MINUTES", 5),
            max_articles_per_source: parsed_env("MAX_ARTICLES_PER_SOURCE", 10),
            auto_publish: bool_env("AUTO_PUBLISH", true),
            ai_enabled: bool_env("AI_ENABLED", true),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn bool_env(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
