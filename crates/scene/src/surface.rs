use foundation::{LngLat, Viewport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::layers::{ClusterConfig, LayerSpec};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("map surface has been removed")]
    Removed,
    #[error("unknown source `{0}`")]
    UnknownSource(String),
    #[error("unknown layer `{0}`")]
    UnknownLayer(String),
    #[error("map library error: {0}")]
    Library(String),
}

/// Pixel position relative to the map container.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub padding_px: f64,
    pub max_zoom: f64,
    pub duration_ms: u32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding_px: 60.0,
            max_zoom: 14.0,
            duration_ms: 450,
        }
    }
}

/// Camera move; `zoom: None` keeps the current zoom.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EaseTarget {
    pub center: LngLat,
    pub zoom: Option<f64>,
    pub offset_px: [f64; 2],
    pub duration_ms: u32,
}

/// One rendered feature under a query point, as the renderer reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedHit {
    pub layer_id: String,
    pub position: Option<LngLat>,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// The map renderer as the engine drives it.
///
/// Implementations wrap an opaque rendering library. Methods that only move
/// the camera or change cursors cannot fail from the engine's point of view;
/// data and style mutations report a [`SurfaceError`].
pub trait MapSurface {
    fn viewport(&self) -> Viewport;

    fn zoom(&self) -> f64;

    fn has_source(&self, id: &str) -> bool;

    fn has_layer(&self, id: &str) -> bool;

    fn add_geojson_source(
        &mut self,
        id: &str,
        data: &Value,
        cluster: &ClusterConfig,
    ) -> Result<(), SurfaceError>;

    /// Replaces the source's whole feature set.
    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError>;

    /// Adds `layer` below `before` when given, on top otherwise.
    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;

    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError>;

    fn fit_bounds(&mut self, bounds: Viewport, options: &FitOptions);

    fn ease_to(&mut self, target: &EaseTarget);

    /// Eases to the zoom at which `cluster_id` breaks apart, centred on `center`.
    ///
    /// The expansion zoom is computed by the renderer's clustering engine, so
    /// this completes asynchronously on the renderer's side.
    fn expand_cluster(&mut self, source_id: &str, cluster_id: u64, center: LngLat);

    /// Features rendered under `point` on any of `layers` that exist.
    fn query_rendered(&self, point: ScreenPoint, layers: &[&str]) -> Vec<RenderedHit>;

    fn set_cursor(&mut self, cursor: Cursor);

    fn set_loading(&mut self, loading: bool);

    fn resize(&mut self);

    /// Releases the renderer. Further calls are no-ops.
    fn remove(&mut self);
}
