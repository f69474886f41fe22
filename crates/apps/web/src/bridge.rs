//! `MapSurface` over Mapbox GL, through a thin inline JS shim.

use foundation::{LngLat, Viewport};
use scene::{
    ClusterConfig, Cursor, EaseTarget, FitOptions, LayerSpec, MapSurface, RenderedHit, ScreenPoint,
    SurfaceError,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

#[wasm_bindgen(inline_js = "
export function spotmap_create(container, token, options) {
    const gl = window.mapboxgl;
    if (!gl) throw new Error('mapboxgl is not loaded');
    gl.accessToken = token;
    const opts = JSON.parse(options);
    const geolocate = opts.geolocate || {};
    delete opts.geolocate;
    const map = new gl.Map(Object.assign({ container }, opts));
    map.addControl(new gl.NavigationControl({ showCompass: false }));
    map.addControl(new gl.GeolocateControl({
        positionOptions: { enableHighAccuracy: true },
        trackUserLocation: true,
        fitBoundsOptions: { maxZoom: geolocate.fitMaxZoom || 14 },
    }));
    map.addControl(new gl.FullscreenControl());
    if (map.touchZoomRotate) map.touchZoomRotate.disableRotation();
    return map;
}

export function spotmap_bounds(map) {
    const b = map.getBounds();
    return new Float64Array([b.getWest(), b.getSouth(), b.getEast(), b.getNorth()]);
}

export function spotmap_zoom(map) { return map.getZoom(); }
export function spotmap_has_source(map, id) { return !!map.getSource(id); }
export function spotmap_has_layer(map, id) { return !!map.getLayer(id); }

export function spotmap_add_source(map, id, data, radius, maxZoom) {
    map.addSource(id, {
        type: 'geojson',
        data: JSON.parse(data),
        cluster: true,
        clusterRadius: radius,
        clusterMaxZoom: maxZoom,
    });
}

export function spotmap_set_data(map, id, data) {
    const source = map.getSource(id);
    if (!source) throw new Error('unknown source ' + id);
    source.setData(JSON.parse(data));
}

export function spotmap_add_layer(map, layer, before) {
    map.addLayer(JSON.parse(layer), before || undefined);
}

export function spotmap_set_filter(map, layer, filter) {
    map.setFilter(layer, JSON.parse(filter));
}

export function spotmap_fit_bounds(map, w, s, e, n, padding, maxZoom, duration) {
    map.fitBounds([[w, s], [e, n]], { padding, maxZoom, duration });
}

export function spotmap_ease_to(map, lng, lat, zoom, ox, oy, duration) {
    const target = { center: [lng, lat], offset: [ox, oy], duration };
    if (!Number.isNaN(zoom)) target.zoom = zoom;
    map.easeTo(target);
}

export function spotmap_expand_cluster(map, sourceId, clusterId, lng, lat) {
    const source = map.getSource(sourceId);
    if (!source) return;
    source.getClusterExpansionZoom(clusterId, (err, zoom) => {
        if (err || map.__spotmapRemoved) return;
        map.easeTo({ center: [lng, lat], zoom });
    });
}

export function spotmap_query(map, x, y, layers) {
    const wanted = JSON.parse(layers).filter((l) => map.getLayer(l));
    if (!wanted.length) return '[]';
    const hits = map.queryRenderedFeatures([x, y], { layers: wanted });
    return JSON.stringify(hits.map((f) => ({
        layer: f.layer ? f.layer.id : '',
        coordinates: f.geometry && f.geometry.type === 'Point' ? f.geometry.coordinates : null,
        properties: f.properties || {},
    })));
}

export function spotmap_set_cursor(map, cursor) { map.getCanvas().style.cursor = cursor; }
export function spotmap_resize(map) { map.resize(); }

export function spotmap_remove(map) {
    map.__spotmapRemoved = true;
    map.remove();
}

export function spotmap_on(map, event, callback) {
    map.on(event, (e) => callback(e.point ? e.point.x : 0, e.point ? e.point.y : 0));
}

export function spotmap_on_load(map, callback) {
    if (map.loaded()) callback();
    else map.once('load', () => callback());
}

export function spotmap_popup_open(map, lng, lat, html, onClose) {
    const popup = new window.mapboxgl.Popup({
        closeOnClick: false,
        maxWidth: '340px',
        offset: 14,
        className: 'spot-popup',
    }).setLngLat([lng, lat]).setHTML(html).addTo(map);
    popup.on('close', () => { if (!popup.__spotmapSilent) onClose(); });
    return popup;
}

export function spotmap_popup_element(popup) { return popup.getElement(); }

export function spotmap_popup_close(popup) {
    popup.__spotmapSilent = true;
    popup.remove();
}
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn spotmap_create(container: &HtmlElement, token: &str, options: &str)
    -> Result<JsValue, JsValue>;

    fn spotmap_bounds(map: &JsValue) -> js_sys::Float64Array;

    fn spotmap_zoom(map: &JsValue) -> f64;

    fn spotmap_has_source(map: &JsValue, id: &str) -> bool;

    fn spotmap_has_layer(map: &JsValue, id: &str) -> bool;

    #[wasm_bindgen(catch)]
    fn spotmap_add_source(
        map: &JsValue,
        id: &str,
        data: &str,
        radius: u32,
        max_zoom: u32,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn spotmap_set_data(map: &JsValue, id: &str, data: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn spotmap_add_layer(map: &JsValue, layer: &str, before: Option<String>) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn spotmap_set_filter(map: &JsValue, layer: &str, filter: &str) -> Result<(), JsValue>;

    #[allow(clippy::too_many_arguments)]
    fn spotmap_fit_bounds(
        map: &JsValue,
        w: f64,
        s: f64,
        e: f64,
        n: f64,
        padding: f64,
        max_zoom: f64,
        duration: u32,
    );

    #[allow(clippy::too_many_arguments)]
    fn spotmap_ease_to(
        map: &JsValue,
        lng: f64,
        lat: f64,
        zoom: f64,
        ox: f64,
        oy: f64,
        duration: u32,
    );

    fn spotmap_expand_cluster(map: &JsValue, source_id: &str, cluster_id: f64, lng: f64, lat: f64);

    fn spotmap_query(map: &JsValue, x: f64, y: f64, layers: &str) -> String;

    fn spotmap_set_cursor(map: &JsValue, cursor: &str);

    fn spotmap_resize(map: &JsValue);

    fn spotmap_remove(map: &JsValue);

    pub(crate) fn spotmap_on(map: &JsValue, event: &str, callback: &js_sys::Function);

    pub(crate) fn spotmap_on_load(map: &JsValue, callback: &js_sys::Function);

    #[wasm_bindgen(catch)]
    pub(crate) fn spotmap_popup_open(
        map: &JsValue,
        lng: f64,
        lat: f64,
        html: &str,
        on_close: &js_sys::Function,
    ) -> Result<JsValue, JsValue>;

    pub(crate) fn spotmap_popup_element(popup: &JsValue) -> web_sys::Element;

    pub(crate) fn spotmap_popup_close(popup: &JsValue);
}

pub(crate) fn js_message(err: &JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

fn library(err: JsValue) -> SurfaceError {
    SurfaceError::Library(js_message(&err))
}

#[derive(Deserialize)]
struct QueryHit {
    layer: String,
    coordinates: Option<[f64; 2]>,
    #[serde(default)]
    properties: Map<String, Value>,
}

/// A live Mapbox GL map inside `container`.
pub struct JsMapSurface {
    map: JsValue,
    container: HtmlElement,
    removed: bool,
}

impl JsMapSurface {
    pub fn create(
        container: HtmlElement,
        token: &str,
        options: &Value,
    ) -> Result<Self, SurfaceError> {
        let map = spotmap_create(&container, token, &options.to_string()).map_err(library)?;
        Ok(Self {
            map,
            container,
            removed: false,
        })
    }

    pub fn handle(&self) -> &JsValue {
        &self.map
    }

    fn live(&self) -> Result<(), SurfaceError> {
        if self.removed { Err(SurfaceError::Removed) } else { Ok(()) }
    }
}

impl MapSurface for JsMapSurface {
    fn viewport(&self) -> Viewport {
        if self.removed {
            return Viewport::new(0.0, 0.0, 0.0, 0.0);
        }
        let bounds = spotmap_bounds(&self.map).to_vec();
        match bounds[..] {
            [west, south, east, north] => Viewport::new(west, south, east, north),
            _ => Viewport::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    fn zoom(&self) -> f64 {
        if self.removed { 0.0 } else { spotmap_zoom(&self.map) }
    }

    fn has_source(&self, id: &str) -> bool {
        !self.removed && spotmap_has_source(&self.map, id)
    }

    fn has_layer(&self, id: &str) -> bool {
        !self.removed && spotmap_has_layer(&self.map, id)
    }

    fn add_geojson_source(
        &mut self,
        id: &str,
        data: &Value,
        cluster: &ClusterConfig,
    ) -> Result<(), SurfaceError> {
        self.live()?;
        spotmap_add_source(&self.map, id, &data.to_string(), cluster.radius, cluster.max_zoom)
            .map_err(library)
    }

    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError> {
        self.live()?;
        if !spotmap_has_source(&self.map, id) {
            return Err(SurfaceError::UnknownSource(id.to_string()));
        }
        spotmap_set_data(&self.map, id, &data.to_string()).map_err(library)
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        self.live()?;
        let before = before.filter(|b| spotmap_has_layer(&self.map, b)).map(str::to_string);
        spotmap_add_layer(&self.map, &layer.body.to_string(), before).map_err(library)
    }

    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError> {
        self.live()?;
        if !spotmap_has_layer(&self.map, layer_id) {
            return Err(SurfaceError::UnknownLayer(layer_id.to_string()));
        }
        spotmap_set_filter(&self.map, layer_id, &filter.to_string()).map_err(library)
    }

    fn fit_bounds(&mut self, bounds: Viewport, options: &FitOptions) {
        if self.removed {
            return;
        }
        let [w, s, e, n] = [bounds.west, bounds.south, bounds.east, bounds.north];
        spotmap_fit_bounds(
            &self.map,
            w,
            s,
            e,
            n,
            options.padding_px,
            options.max_zoom,
            options.duration_ms,
        );
    }

    fn ease_to(&mut self, target: &EaseTarget) {
        if self.removed {
            return;
        }
        let [ox, oy] = target.offset_px;
        spotmap_ease_to(
            &self.map,
            target.center.lng,
            target.center.lat,
            target.zoom.unwrap_or(f64::NAN),
            ox,
            oy,
            target.duration_ms,
        );
    }

    fn expand_cluster(&mut self, source_id: &str, cluster_id: u64, center: LngLat) {
        if !self.removed {
            spotmap_expand_cluster(&self.map, source_id, cluster_id as f64, center.lng, center.lat);
        }
    }

    fn query_rendered(&self, point: ScreenPoint, layers: &[&str]) -> Vec<RenderedHit> {
        if self.removed {
            return Vec::new();
        }
        let layers = Value::from(layers.to_vec()).to_string();
        let raw = spotmap_query(&self.map, point.x, point.y, &layers);
        match serde_json::from_str::<Vec<QueryHit>>(&raw) {
            Ok(hits) => hits
                .into_iter()
                .map(|h| RenderedHit {
                    layer_id: h.layer,
                    position: h.coordinates.map(|[lng, lat]| LngLat::new(lng, lat)),
                    properties: h.properties,
                })
                .collect(),
            Err(err) => {
                tracing::debug!("unreadable feature query result: {err}");
                Vec::new()
            }
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        if self.removed {
            return;
        }
        let css = match cursor {
            Cursor::Default => "",
            Cursor::Pointer => "pointer",
        };
        spotmap_set_cursor(&self.map, css);
    }

    fn set_loading(&mut self, loading: bool) {
        let _ = self.container.class_list().toggle_with_force("spot-map--loading", loading);
        let _ = self.container.set_attribute("aria-busy", if loading { "true" } else { "false" });
    }

    fn resize(&mut self) {
        if !self.removed {
            spotmap_resize(&self.map);
        }
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.set_loading(false);
        spotmap_remove(&self.map);
    }
}
