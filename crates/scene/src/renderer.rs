use foundation::{LngLat, SpotId};
use streaming::FeatureCollection;

use crate::layers::{ClusterConfig, SELECTED_LAYER, SOURCE_ID, selection_filter, spot_layers};
use crate::picking::{ClickAction, hover_cursor, route_click};
use crate::selection::SelectionState;
use crate::surface::{Cursor, EaseTarget, FitOptions, MapSurface, ScreenPoint, SurfaceError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RendererState {
    /// Nothing drawn yet; the next successful render creates the layers.
    Idle,
    /// Source and layers exist. Further renders only replace data.
    Drawn,
    TornDown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub points: usize,
    pub created_layers: bool,
    pub fitted: bool,
}

/// Owns the clustered spot layer on a [`MapSurface`].
///
/// Data is replaced wholesale on every render. The selected variant is a
/// separate layer whose filter matches the selected feature id, so selection
/// survives data replacement without touching per-feature state.
#[derive(Debug, Clone)]
pub struct ClusterRenderer {
    state: RendererState,
    cluster: ClusterConfig,
    fit: FitOptions,
    selection: SelectionState,
}

impl ClusterRenderer {
    pub fn new(cluster: ClusterConfig, fit: FitOptions) -> Self {
        Self {
            state: RendererState::Idle,
            cluster,
            fit,
            selection: SelectionState::new(),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn selected(&self) -> Option<&SpotId> {
        self.selection.current()
    }

    pub fn render<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        features: &FeatureCollection,
    ) -> Result<RenderReport, SurfaceError> {
        let data = features.to_geojson();
        let mut report = RenderReport {
            points: features.len(),
            created_layers: false,
            fitted: false,
        };

        match self.state {
            RendererState::TornDown => return Err(SurfaceError::Removed),
            RendererState::Drawn => {
                surface.set_source_data(SOURCE_ID, &data)?;
                return Ok(report);
            }
            RendererState::Idle => {}
        }

        if surface.has_source(SOURCE_ID) {
            surface.set_source_data(SOURCE_ID, &data)?;
        } else {
            surface.add_geojson_source(SOURCE_ID, &data, &self.cluster)?;
        }
        for (layer, before) in spot_layers() {
            if !surface.has_layer(layer.id) {
                surface.add_layer(&layer, before)?;
                report.created_layers = true;
            }
        }
        if self.selection.current().is_some() {
            surface.set_filter(SELECTED_LAYER, &selection_filter(self.selection.current()))?;
        }

        if let Some(bounds) = features.bounds() {
            if !bounds.is_degenerate() {
                surface.fit_bounds(bounds, &self.fit);
                report.fitted = true;
            }
        }
        self.state = RendererState::Drawn;
        tracing::debug!("spot layer created with {} points", report.points);
        Ok(report)
    }

    /// Highlights `id`. Before the layers exist the selection is only
    /// remembered and applied on first render.
    pub fn select_feature<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: SpotId,
    ) -> Result<(), SurfaceError> {
        self.selection.select(id);
        self.apply_selection(surface)
    }

    pub fn clear_selection<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<(), SurfaceError> {
        if self.selection.clear().is_none() {
            return Ok(());
        }
        self.apply_selection(surface)
    }

    fn apply_selection<S: MapSurface + ?Sized>(&self, surface: &mut S) -> Result<(), SurfaceError> {
        if self.state != RendererState::Drawn || !surface.has_layer(SELECTED_LAYER) {
            return Ok(());
        }
        surface.set_filter(SELECTED_LAYER, &selection_filter(self.selection.current()))
    }

    pub fn route_click<S: MapSurface + ?Sized>(
        &self,
        surface: &S,
        point: ScreenPoint,
    ) -> ClickAction {
        if self.state != RendererState::Drawn {
            return ClickAction::Clear;
        }
        route_click(surface, point)
    }

    pub fn update_cursor<S: MapSurface + ?Sized>(
        &self,
        surface: &mut S,
        point: ScreenPoint,
    ) -> Cursor {
        let cursor = if self.state == RendererState::Drawn {
            hover_cursor(surface, point)
        } else {
            Cursor::Default
        };
        surface.set_cursor(cursor);
        cursor
    }

    pub fn expand_cluster<S: MapSurface + ?Sized>(
        &self,
        surface: &mut S,
        cluster_id: u64,
        center: LngLat,
    ) {
        surface.expand_cluster(SOURCE_ID, cluster_id, center);
    }

    /// Eases the camera onto a selected spot, keeping the current zoom.
    pub fn focus<S: MapSurface + ?Sized>(
        &self,
        surface: &mut S,
        position: LngLat,
        offset_y_px: f64,
        duration_ms: u32,
    ) {
        let zoom = surface.zoom();
        surface.ease_to(&EaseTarget {
            center: position,
            zoom: Some(zoom),
            offset_px: [0.0, offset_y_px],
            duration_ms,
        });
    }

    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.state == RendererState::TornDown {
            return;
        }
        self.selection.clear();
        surface.remove();
        self.state = RendererState::TornDown;
    }
}
