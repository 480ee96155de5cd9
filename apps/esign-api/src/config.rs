//! Environment configuration for the eSignature API

use esign_core::Size;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,

    /// SQLite URL; a per-user data directory is used when unset
    pub database_url: Option<String>,

    /// Frontend origin; signing links point at `{public_app_url}/sign`
    pub public_app_url: String,

    /// Externally reachable origin of this API, used for document links
    pub public_api_url: String,

    pub relay_url: Option<String>,
    pub relay_api_key: Option<String>,

    /// Output page size in millimetres
    pub page: Size,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            database_url: None,
            public_app_url: "http://localhost:5173".to_string(),
            public_api_url: "http://localhost:3001".to_string(),
            relay_url: None,
            relay_api_key: None,
            page: Size::A4_MM,
        }
    }
}

impl ApiConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            database_url: var("DATABASE_URL"),
            public_app_url: var("PUBLIC_APP_URL").unwrap_or(defaults.public_app_url),
            public_api_url: var("PUBLIC_API_URL").unwrap_or(defaults.public_api_url),
            relay_url: var("RELAY_URL"),
            relay_api_key: var("RELAY_API_KEY"),
            page: Size::new(
                parsed_var("PAGE_WIDTH_MM").unwrap_or(defaults.page.width),
                parsed_var("PAGE_HEIGHT_MM").unwrap_or(defaults.page.height),
            ),
        }
    }

    pub fn signing_base_url(&self) -> String {
        format!("{}/sign", self.public_app_url.trim_end_matches('/'))
    }

    pub fn document_url(&self, request_id: &str) -> String {
        format!(
            "{}/api/requests/{}/document",
            self.public_api_url.trim_end_matches('/'),
            request_id
        )
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|v| v.parse().ok())
}
