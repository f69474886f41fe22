use foundation::{LngLat, SpotId};
use streaming::{FEATURE_ID_PROPERTY, spot_id_of};

use crate::layers::{CLUSTER_LAYERS, POINT_LAYERS};
use crate::surface::{Cursor, MapSurface, RenderedHit, ScreenPoint};

/// What a map click means.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickAction {
    SelectSpot { id: SpotId, position: LngLat },
    ExpandCluster { cluster_id: u64, center: LngLat },
    Clear,
}

/// Individual points are tested first, then clusters; anything else clears.
pub fn route_click<S: MapSurface + ?Sized>(surface: &S, point: ScreenPoint) -> ClickAction {
    if let Some((id, position)) = surface
        .query_rendered(point, &POINT_LAYERS)
        .iter()
        .find_map(point_hit)
    {
        return ClickAction::SelectSpot { id, position };
    }
    if let Some((cluster_id, center)) = surface
        .query_rendered(point, &CLUSTER_LAYERS)
        .iter()
        .find_map(cluster_hit)
    {
        return ClickAction::ExpandCluster { cluster_id, center };
    }
    ClickAction::Clear
}

/// Pointer over anything clickable.
pub fn hover_cursor<S: MapSurface + ?Sized>(surface: &S, point: ScreenPoint) -> Cursor {
    let layers = [POINT_LAYERS[0], POINT_LAYERS[1], CLUSTER_LAYERS[0], CLUSTER_LAYERS[1]];
    if surface.query_rendered(point, &layers).is_empty() {
        Cursor::Default
    } else {
        Cursor::Pointer
    }
}

fn point_hit(hit: &RenderedHit) -> Option<(SpotId, LngLat)> {
    let id = spot_id_of(hit.properties.get(FEATURE_ID_PROPERTY)?)?;
    Some((id, hit.position?))
}

fn cluster_hit(hit: &RenderedHit) -> Option<(u64, LngLat)> {
    let cluster_id = hit.properties.get("cluster_id")?.as_u64()?;
    Some((cluster_id, hit.position?))
}
