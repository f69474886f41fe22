use foundation::{LngLat, Viewport};
use scene::{ClusterConfig, FitOptions};
use serde::Deserialize;
use streaming::DEFAULT_BATCH_SIZE;
use ui::{DEFAULT_COLLAPSED_PX, DEFAULT_MOBILE_MAX_WIDTH_PX, SelectEase, SheetConfig};
use votes::{BootstrapUrls, DEFAULT_VOTES_KEY, VoteEndpoints};

pub const DEFAULT_TOKEN_META: &str = "mapbox-token";
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no map credential in <meta name=\"{meta}\">")]
    MissingToken { meta: String },
    #[error("invalid map configuration: {0}")]
    Invalid(String),
}

/// Settings handed over by the embedding page at mount.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub api_url: String,
    pub votes_url: String,
    pub likes_url: String,
    pub dislikes_url: String,
    pub spot_url_prefix: String,
    pub votes_storage_key: String,
    pub style_url: String,
    pub center: [f64; 2],
    pub zoom: f64,
    /// `[[west, south], [east, north]]`
    pub max_bounds: [[f64; 2]; 2],
    pub cluster: ClusterConfig,
    pub fit: FitOptions,
    pub select_ease: SelectEase,
    pub mobile_max_width_px: f64,
    pub description_collapsed_px: f64,
    pub sheet: SheetConfig,
    pub batch_size: usize,
    pub cache_budget_bytes: usize,
    pub token_meta: String,
    pub log_level: String,
    /// Defer map creation until the container scrolls into view.
    pub lazy: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_url: "/spots.json".into(),
            votes_url: "/votes".into(),
            likes_url: "/likes".into(),
            dislikes_url: "/dislikes".into(),
            spot_url_prefix: "/spots".into(),
            votes_storage_key: DEFAULT_VOTES_KEY.into(),
            style_url: "mapbox://styles/mapbox/light-v11".into(),
            center: [2.3522, 48.8566],
            zoom: 11.4,
            max_bounds: [[-1.0, 47.8], [5.5, 50.5]],
            cluster: ClusterConfig::default(),
            fit: FitOptions::default(),
            select_ease: SelectEase::default(),
            mobile_max_width_px: DEFAULT_MOBILE_MAX_WIDTH_PX,
            description_collapsed_px: DEFAULT_COLLAPSED_PX,
            sheet: SheetConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            token_meta: DEFAULT_TOKEN_META.into(),
            log_level: "info".into(),
            lazy: true,
        }
    }
}

impl MapConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()
    }

    /// Parses the page-supplied JSON. Absent or blank input means defaults.
    pub fn from_page(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Self::from_json(raw),
            None => Ok(Self::default()),
        }
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url is empty".into()));
        }
        if !LngLat::new(self.center[0], self.center[1]).is_plausible() {
            return Err(ConfigError::Invalid(format!("center {:?} out of range", self.center)));
        }
        if self.max_bounds().is_degenerate() {
            return Err(ConfigError::Invalid("max_bounds is empty".into()));
        }
        self.batch_size = self.batch_size.max(1);
        Ok(self)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(self.center[0], self.center[1])
    }

    pub fn max_bounds(&self) -> Viewport {
        let [[west, south], [east, north]] = self.max_bounds;
        Viewport::new(west, south, east, north)
    }

    pub fn vote_endpoints(&self) -> VoteEndpoints {
        VoteEndpoints::new(self.spot_url_prefix.clone())
    }

    pub fn bootstrap_urls(&self) -> BootstrapUrls {
        BootstrapUrls {
            votes: self.votes_url.clone(),
            likes: self.likes_url.clone(),
            dislikes: self.dislikes_url.clone(),
        }
    }

    /// Map options for the rendering library, minus the container.
    pub fn map_options(&self) -> serde_json::Value {
        serde_json::json!({
            "style": self.style_url,
            "center": self.center,
            "zoom": self.zoom,
            "maxBounds": self.max_bounds,
            "dragRotate": false,
            "pitchWithRotate": false,
            "touchPitch": false,
            "boxZoom": false,
            "doubleClickZoom": false,
            "keyboard": false,
            "geolocate": { "fitMaxZoom": self.fit.max_zoom },
        })
    }
}

/// Validates the credential read from the page's meta tag.
pub fn require_token(content: Option<String>, meta: &str) -> Result<String, ConfigError> {
    content
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConfigError::MissingToken { meta: meta.to_string() })
}
