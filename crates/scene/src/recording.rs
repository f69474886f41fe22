//! In-memory [`MapSurface`] that records every call, for driving the engine
//! without a browser.

use std::collections::BTreeMap;

use foundation::{LngLat, Viewport};
use serde_json::{Map, Value, json};
use streaming::FEATURE_ID_PROPERTY;

use crate::layers::{ClusterConfig, LayerSpec};
use crate::surface::{
    Cursor, EaseTarget, FitOptions, MapSurface, RenderedHit, ScreenPoint, SurfaceError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddSource { id: String, features: usize },
    SetData { id: String, features: usize },
    AddLayer { id: String, before: Option<String> },
    SetFilter { layer: String, filter: Value },
    FitBounds(Viewport),
    EaseTo(EaseTarget),
    ExpandCluster { cluster_id: u64, center: LngLat },
    SetCursor(Cursor),
    SetLoading(bool),
    Resize,
    Remove,
}

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    viewport: Viewport,
    zoom: f64,
    sources: BTreeMap<String, Value>,
    layers: Vec<String>,
    filters: BTreeMap<String, Value>,
    hits: Vec<RenderedHit>,
    calls: Vec<SurfaceCall>,
    loading: bool,
    removed: bool,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(2.0, 48.0, 3.0, 49.0),
            zoom: 11.4,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            filters: BTreeMap::new(),
            hits: Vec::new(),
            calls: Vec::new(),
            loading: false,
            removed: false,
        }
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn add_hit(&mut self, hit: RenderedHit) {
        self.hits.push(hit);
    }

    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    pub fn point_hit(layer: &str, id: &str, position: LngLat) -> RenderedHit {
        RenderedHit {
            layer_id: layer.to_string(),
            position: Some(position),
            properties: props(json!({ FEATURE_ID_PROPERTY: id })),
        }
    }

    pub fn cluster_hit(layer: &str, cluster_id: u64, center: LngLat) -> RenderedHit {
        RenderedHit {
            layer_id: layer.to_string(),
            position: Some(center),
            properties: props(json!({ "cluster": true, "cluster_id": cluster_id })),
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn layer_ids(&self) -> &[String] {
        &self.layers
    }

    pub fn filter(&self, layer: &str) -> Option<&Value> {
        self.filters.get(layer)
    }

    pub fn source_data(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)
    }

    /// Number of features currently in source `id`.
    pub fn feature_count(&self, id: &str) -> usize {
        self.sources.get(id).map_or(0, count_features)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn check_live(&self) -> Result<(), SurfaceError> {
        if self.removed {
            Err(SurfaceError::Removed)
        } else {
            Ok(())
        }
    }
}

fn props(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

fn count_features(data: &Value) -> usize {
    data["features"].as_array().map_or(0, Vec::len)
}

impl MapSurface for RecordingSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l == id)
    }

    fn add_geojson_source(
        &mut self,
        id: &str,
        data: &Value,
        _cluster: &ClusterConfig,
    ) -> Result<(), SurfaceError> {
        self.check_live()?;
        if self.sources.contains_key(id) {
            return Err(SurfaceError::Library(format!("source `{id}` already exists")));
        }
        self.sources.insert(id.to_string(), data.clone());
        self.calls.push(SurfaceCall::AddSource {
            id: id.to_string(),
            features: count_features(data),
        });
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError> {
        self.check_live()?;
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::UnknownSource(id.to_string()))?;
        *slot = data.clone();
        self.calls.push(SurfaceCall::SetData {
            id: id.to_string(),
            features: count_features(data),
        });
        Ok(())
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        self.check_live()?;
        let at = match before {
            Some(b) => self
                .layers
                .iter()
                .position(|l| l == b)
                .ok_or_else(|| SurfaceError::UnknownLayer(b.to_string()))?,
            None => self.layers.len(),
        };
        self.layers.insert(at, layer.id.to_string());
        if let Some(filter) = layer.body.get("filter") {
            self.filters.insert(layer.id.to_string(), filter.clone());
        }
        self.calls.push(SurfaceCall::AddLayer {
            id: layer.id.to_string(),
            before: before.map(str::to_string),
        });
        Ok(())
    }

    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError> {
        self.check_live()?;
        if !self.has_layer(layer_id) {
            return Err(SurfaceError::UnknownLayer(layer_id.to_string()));
        }
        self.filters.insert(layer_id.to_string(), filter.clone());
        self.calls.push(SurfaceCall::SetFilter {
            layer: layer_id.to_string(),
            filter: filter.clone(),
        });
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Viewport, _options: &FitOptions) {
        if !self.removed {
            self.calls.push(SurfaceCall::FitBounds(bounds));
        }
    }

    fn ease_to(&mut self, target: &EaseTarget) {
        if !self.removed {
            self.calls.push(SurfaceCall::EaseTo(*target));
        }
    }

    fn expand_cluster(&mut self, _source_id: &str, cluster_id: u64, center: LngLat) {
        if !self.removed {
            self.calls.push(SurfaceCall::ExpandCluster { cluster_id, center });
        }
    }

    fn query_rendered(&self, _point: ScreenPoint, layers: &[&str]) -> Vec<RenderedHit> {
        self.hits
            .iter()
            .filter(|h| layers.contains(&h.layer_id.as_str()))
            .cloned()
            .collect()
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        if !self.removed {
            self.calls.push(SurfaceCall::SetCursor(cursor));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.calls.push(SurfaceCall::SetLoading(loading));
    }

    fn resize(&mut self) {
        if !self.removed {
            self.calls.push(SurfaceCall::Resize);
        }
    }

    fn remove(&mut self) {
        if !self.removed {
            self.removed = true;
            self.hits.clear();
            self.calls.push(SurfaceCall::Remove);
        }
    }
}
