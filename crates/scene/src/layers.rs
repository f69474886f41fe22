//! Source and layer definitions for the clustered spot layer.

use foundation::SpotId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use streaming::FEATURE_ID_PROPERTY;

pub const SOURCE_ID: &str = "spots-source";
pub const CLUSTERS_LAYER: &str = "clusters";
pub const CLUSTER_COUNT_LAYER: &str = "cluster-count";
pub const POINTS_LAYER: &str = "spots-circles";
pub const SELECTED_LAYER: &str = "spots-circles--selected";

/// Filter operand that matches no feature id.
pub const NO_SELECTION: &str = "__none__";

pub const POINT_LAYERS: [&str; 2] = [POINTS_LAYER, SELECTED_LAYER];
pub const CLUSTER_LAYERS: [&str; 2] = [CLUSTERS_LAYER, CLUSTER_COUNT_LAYER];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pixel radius within which points merge.
    pub radius: u32,
    /// Zoom above which nothing is clustered.
    pub max_zoom: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius: 100,
            max_zoom: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: &'static str,
    /// Complete style-spec layer object, including `id` and `source`.
    pub body: Value,
}

/// Layers in insertion order, each with the layer it must be inserted below.
pub fn spot_layers() -> Vec<(LayerSpec, Option<&'static str>)> {
    vec![
        (clusters_layer(), None),
        (cluster_count_layer(), None),
        (points_layer(), None),
        (selected_layer(None), Some(POINTS_LAYER)),
    ]
}

pub fn clusters_layer() -> LayerSpec {
    LayerSpec {
        id: CLUSTERS_LAYER,
        body: json!({
            "id": CLUSTERS_LAYER,
            "type": "circle",
            "source": SOURCE_ID,
            "filter": ["has", "point_count"],
            "paint": {
                "circle-color": "#2f93eb",
                "circle-opacity": 0.6,
                "circle-radius": [
                    "interpolate", ["exponential", 1.2], ["get", "point_count"],
                    1, 24, 10, 30, 25, 36, 75, 44, 150, 54
                ],
                "circle-blur": 0.05
            }
        }),
    }
}

pub fn cluster_count_layer() -> LayerSpec {
    LayerSpec {
        id: CLUSTER_COUNT_LAYER,
        body: json!({
            "id": CLUSTER_COUNT_LAYER,
            "type": "symbol",
            "source": SOURCE_ID,
            "filter": ["has", "point_count"],
            "layout": {
                "text-field": ["get", "point_count_abbreviated"],
                "text-size": [
                    "interpolate", ["linear"], ["get", "point_count"],
                    1, 13, 10, 14, 25, 15, 75, 16, 150, 18
                ],
                "text-font": ["DIN Offc Pro Medium", "Arial Unicode MS Bold"],
                "text-allow-overlap": true,
                "text-ignore-placement": true
            },
            "paint": {
                "text-color": "#FFFFFF",
                "text-halo-width": 1.2,
                "text-halo-blur": 0.2
            }
        }),
    }
}

pub fn points_layer() -> LayerSpec {
    LayerSpec {
        id: POINTS_LAYER,
        body: json!({
            "id": POINTS_LAYER,
            "type": "circle",
            "source": SOURCE_ID,
            "filter": ["!", ["has", "point_count"]],
            "paint": {
                "circle-color": "#2563EB",
                "circle-radius": 6,
                "circle-stroke-color": "#ffffff",
                "circle-stroke-width": 1.5,
                "circle-opacity": 0.9
            }
        }),
    }
}

pub fn selected_layer(selected: Option<&SpotId>) -> LayerSpec {
    LayerSpec {
        id: SELECTED_LAYER,
        body: json!({
            "id": SELECTED_LAYER,
            "type": "circle",
            "source": SOURCE_ID,
            "filter": selection_filter(selected),
            "paint": {
                "circle-color": "#1E3A8A",
                "circle-radius": 8,
                "circle-stroke-color": "#ffffff",
                "circle-stroke-width": 2,
                "circle-opacity": 1
            }
        }),
    }
}

/// Matches the feature whose id property equals `selected`, or nothing.
pub fn selection_filter(selected: Option<&SpotId>) -> Value {
    let operand = selected.map_or(NO_SELECTION, SpotId::as_str);
    json!(["==", ["to-string", ["get", FEATURE_ID_PROPERTY]], operand])
}
