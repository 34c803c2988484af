//! Configuration management for Marauder's Map.
//!
//! Configuration is set via environment variables:
//! - `GEMINI_API_KEY` - Required for the marker service. Key for the vision model.
//! - `GEMINI_MODEL` - Optional. Vision model id. Defaults to `gemini-1.5-flash`.
//! - `HOST` - Optional. Marker service host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Marker service port. Defaults to `4000`.
//! - `MARKERS_PATH` - Optional. Marker file. Defaults to `markers.json`.
//! - `MAX_UPLOAD_BYTES` - Optional. Request body limit. Defaults to 10 MiB.
//!
//! Client-side variables, read only by [`WorkflowConfig::from_env`]:
//! - `API_BASE_URL` - Optional. Quest/inventory persistence API.
//! - `MARKER_UPLOAD_URL` - Optional. Where clients send map markers.
//! - `QUEST_RADIUS_METERS` - Optional. Quest step radius. Defaults to `80`.
//! - `VENUE_RADIUS_METERS` - Optional. Mall/hospital radius. Defaults to `120`.
//! - `LOCATION_TIMEOUT_SECS` - Optional. Position fix timeout. Defaults to `15`.
//! - `CATALOG_PATH` - Optional. Catalog JSON overriding the built-in one.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::geo::ProximityRadius;
use crate::location::PositionRequest;
use crate::session::Session;

pub const DEFAULT_API_BASE_URL: &str = "https://maraudersworld.onrender.com";
pub const DEFAULT_MARKER_UPLOAD_URL: &str = "http://127.0.0.1:4000/uploadMarker";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Vision classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Gemini API key
    pub api_key: String,

    /// Model identifier
    pub model: String,
}

/// Settings the quest workflow needs on the client side.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Base URL of the quest/inventory persistence API
    pub api_base_url: String,

    /// Marker service upload endpoint
    pub marker_upload_url: String,

    /// Radius used for quest step checks
    pub quest_radius: ProximityRadius,

    /// Radius used for mall/hospital checks
    pub venue_radius: ProximityRadius,

    /// How long to wait for a position fix
    pub location_timeout: Duration,

    /// Catalog override; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            marker_upload_url: DEFAULT_MARKER_UPLOAD_URL.to_string(),
            quest_radius: ProximityRadius::QUEST_DEFAULT,
            venue_radius: ProximityRadius::VENUE_DEFAULT,
            location_timeout: Duration::from_secs(15),
            catalog_path: None,
        }
    }
}

impl WorkflowConfig {
    /// Load the workflow settings from the environment.
    ///
    /// Every variable is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let quest_radius = match parse_env::<f64>("QUEST_RADIUS_METERS")? {
            Some(meters) => radius("QUEST_RADIUS_METERS", meters)?,
            None => defaults.quest_radius,
        };
        let venue_radius = match parse_env::<f64>("VENUE_RADIUS_METERS")? {
            Some(meters) => radius("VENUE_RADIUS_METERS", meters)?,
            None => defaults.venue_radius,
        };
        let location_timeout = parse_env::<u64>("LOCATION_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.location_timeout);

        Ok(Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            marker_upload_url: std::env::var("MARKER_UPLOAD_URL")
                .unwrap_or(defaults.marker_upload_url),
            quest_radius,
            venue_radius,
            location_timeout,
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
        })
    }

    /// Position query options for every workflow check.
    pub fn position_request(&self) -> PositionRequest {
        PositionRequest {
            timeout: self.location_timeout,
            ..PositionRequest::default()
        }
    }

    /// Session against the configured persistence API.
    pub fn session(&self, access_token: Option<String>) -> Session {
        match access_token {
            Some(token) => Session::new(token, self.api_base_url.clone()),
            None => Session::anonymous(self.api_base_url.clone()),
        }
    }
}

/// Marker service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// JSON file the markers are appended to
    pub markers_path: PathBuf,

    /// Maximum request body size (base64 images are large)
    pub max_upload_bytes: usize,

    /// Vision classifier settings
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Load the marker service settings from environment variables.
    ///
    /// Client-side variables are not consulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = parse_env::<u16>("PORT")?.unwrap_or(4000);

        let markers_path = std::env::var("MARKERS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("markers.json"));

        let max_upload_bytes =
            parse_env::<usize>("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            host,
            port,
            markers_path,
            max_upload_bytes,
            classifier: ClassifierConfig { api_key, model },
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, markers_path: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            markers_path,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            classifier: ClassifierConfig {
                api_key,
                model: "gemini-1.5-flash".to_string(),
            },
        }
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

fn radius(name: &str, meters: f64) -> Result<ProximityRadius, ConfigError> {
    ProximityRadius::new(meters).ok_or_else(|| {
        ConfigError::InvalidValue(
            name.to_string(),
            format!("{} is not a non-negative distance", meters),
        )
    })
}
