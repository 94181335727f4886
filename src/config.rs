use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::{AppError, AppResult};

pub const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_PRODUCT_API_BASE: &str = "https://world.openfoodfacts.org/api/v2/product";
pub const DEFAULT_GEOCODE_API_BASE: &str = "https://api.zippopotam.us/us";
pub const DEFAULT_OVERPASS_API_URL: &str = "https://overpass-api.de/api/interpreter";

/// Process configuration, read once at startup and handed to the services
/// that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub groq_api_key: Option<String>,
    pub groq_api_base: String,
    pub groq_model: String,
    pub product_api_base: String,
    pub geocode_api_base: String,
    pub overpass_api_url: String,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub market_radius_miles: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            groq_api_key: None,
            groq_api_base: DEFAULT_GROQ_API_BASE.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            product_api_base: DEFAULT_PRODUCT_API_BASE.to_string(),
            geocode_api_base: DEFAULT_GEOCODE_API_BASE.to_string(),
            overpass_api_url: DEFAULT_OVERPASS_API_URL.to_string(),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            market_radius_miles: 25.0,
        }
    }
}

impl Config {
    /// Loads the configuration from the environment. Call `dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let groq_api_key = var("GROQ_API_KEY").filter(|key| !key.trim().is_empty());
        if groq_api_key.is_none() {
            warn!("GROQ_API_KEY not set, AI enrichment disabled");
        }

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: try_load("PORT", defaults.port)?,
            groq_api_key,
            groq_api_base: var("GROQ_API_BASE").unwrap_or(defaults.groq_api_base),
            groq_model: var("GROQ_MODEL").unwrap_or(defaults.groq_model),
            product_api_base: var("PRODUCT_API_BASE").unwrap_or(defaults.product_api_base),
            geocode_api_base: var("GEOCODE_API_BASE").unwrap_or(defaults.geocode_api_base),
            overpass_api_url: var("OVERPASS_API_URL").unwrap_or(defaults.overpass_api_url),
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            static_dir: var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            market_radius_miles: try_load("MARKET_RADIUS_MILES", defaults.market_radius_miles)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::InvalidConfig(format!("{key}={raw}: {e}"))
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
