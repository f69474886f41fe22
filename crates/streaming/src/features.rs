use std::future::Future;

use foundation::{LngLat, SpotId, Viewport};
use runtime::{BatchCursor, Generation};
use serde_json::{Map, Value, json};

use crate::protocol::Spot;

/// Property carrying the spot id as a string; selection filters compare on it.
pub const FEATURE_ID_PROPERTY: &str = "__fid";

/// Items converted per slice before yielding back to the event loop.
pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: SpotId,
    pub position: LngLat,
    pub properties: Map<String, Value>,
}

impl PointFeature {
    pub fn from_spot(spot: &Spot) -> Self {
        let mut properties = Map::new();
        properties.insert(FEATURE_ID_PROPERTY.into(), Value::from(spot.id.as_str()));
        properties.insert("name".into(), Value::from(spot.name.as_str()));
        properties.insert("address".into(), Value::from(spot.address.as_str()));
        properties.insert("description".into(), Value::from(spot.description.as_str()));
        properties.insert(
            "button_link".into(),
            spot.button_link.as_deref().map_or(Value::Null, Value::from),
        );
        properties.insert("tags".into(), Value::from(spot.tags.clone()));
        properties.insert("image_urls".into(), Value::from(spot.image_urls.clone()));
        properties.insert("likes_count".into(), Value::from(spot.counts.likes));
        properties.insert("dislikes_count".into(), Value::from(spot.counts.dislikes));
        Self {
            id: spot.id.clone(),
            position: spot.position,
            properties,
        }
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": self.position.to_array() },
            "properties": self.properties,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<PointFeature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<Viewport> {
        Viewport::enclosing(self.features.iter().map(|f| f.position))
    }

    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self.features.iter().map(PointFeature::to_geojson).collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

/// Output of a finished [`FeatureBuildJob`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltFeatures {
    pub generation: Generation,
    pub collection: FeatureCollection,
    pub spots: Vec<Spot>,
}

/// Converts spots to features a slice at a time.
#[derive(Debug, Clone)]
pub struct FeatureBuildJob {
    generation: Generation,
    spots: Vec<Spot>,
    cursor: BatchCursor,
    features: Vec<PointFeature>,
}

impl FeatureBuildJob {
    pub fn new(generation: Generation, spots: Vec<Spot>, batch_size: usize) -> Self {
        let cursor = BatchCursor::new(spots.len(), batch_size);
        Self {
            generation,
            features: Vec::with_capacity(spots.len()),
            spots,
            cursor,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_done(&self) -> bool {
        self.cursor.is_done()
    }

    /// Converts one slice; returns how many features it produced.
    pub fn step(&mut self) -> usize {
        let mut budget = self.cursor.slice_budget();
        let range = self.cursor.advance(&mut budget);
        let n = range.len();
        self.features
            .extend(self.spots[range].iter().map(PointFeature::from_spot));
        n
    }

    pub fn finish(self) -> BuiltFeatures {
        BuiltFeatures {
            generation: self.generation,
            collection: FeatureCollection {
                features: self.features,
            },
            spots: self.spots,
        }
    }
}

/// Runs `job` to completion, yielding between slices.
///
/// Returns `None` as soon as `still_current` reports the job's generation stale.
pub async fn build_features<Y, Fut, C>(
    mut job: FeatureBuildJob,
    mut yield_now: Y,
    still_current: C,
) -> Option<BuiltFeatures>
where
    Y: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    C: Fn(Generation) -> bool,
{
    loop {
        if !still_current(job.generation()) {
            return None;
        }
        job.step();
        if job.is_done() {
            return Some(job.finish());
        }
        yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VoteCounts;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn spot(id: u64, lng: f64, lat: f64) -> Spot {
        Spot {
            id: SpotId::from(id),
            name: format!("Spot {id}"),
            address: String::new(),
            description: String::new(),
            button_link: None,
            image_urls: Vec::new(),
            tags: vec!["calme".into()],
            position: LngLat::new(lng, lat),
            counts: VoteCounts::new(2, 0),
        }
    }

    #[test]
    fn feature_carries_display_properties() {
        let f = PointFeature::from_spot(&spot(7, 2.35, 48.85));
        let geo = f.to_geojson();
        assert_eq!(geo["geometry"]["coordinates"], json!([2.35, 48.85]));
        assert_eq!(geo["properties"]["__fid"], json!("7"));
        assert_eq!(geo["properties"]["likes_count"], json!(2));
        assert_eq!(geo["properties"]["button_link"], Value::Null);
    }

    #[test]
    fn job_runs_in_slices() {
        let spots: Vec<Spot> = (0..450).map(|i| spot(i, 2.0, 48.0)).collect();
        let mut job = FeatureBuildJob::new(Generation(1), spots, 200);
        let mut slices = Vec::new();
        while !job.is_done() {
            slices.push(job.step());
        }
        assert_eq!(slices, vec![200, 200, 50]);
        let built = job.finish();
        assert_eq!(built.collection.len(), 450);
        assert_eq!(built.spots.len(), 450);
    }

    #[test]
    fn build_stops_when_superseded() {
        let spots: Vec<Spot> = (0..500).map(|i| spot(i, 2.0, 48.0)).collect();
        let job = FeatureBuildJob::new(Generation(3), spots, 200);
        let yields = Cell::new(0);

        let out = pollster::block_on(build_features(
            job,
            || {
                yields.set(yields.get() + 1);
                std::future::ready(())
            },
            |_| yields.get() < 1,
        ));
        assert!(out.is_none());
        assert_eq!(yields.get(), 1);
    }

    #[test]
    fn empty_input_completes_immediately() {
        let job = FeatureBuildJob::new(Generation(1), Vec::new(), 200);
        let out = pollster::block_on(build_features(job, || std::future::ready(()), |_| true));
        let built = out.expect("built");
        assert!(built.collection.is_empty());
        assert_eq!(built.collection.bounds(), None);
    }

    #[test]
    fn collection_bounds_enclose_all_points() {
        let collection = FeatureCollection {
            features: vec![
                PointFeature::from_spot(&spot(1, 2.0, 48.0)),
                PointFeature::from_spot(&spot(2, 3.0, 49.0)),
            ],
        };
        assert_eq!(collection.bounds(), Some(Viewport::new(2.0, 48.0, 3.0, 49.0)));
        assert_eq!(collection.to_geojson()["features"].as_array().map(Vec::len), Some(2));
    }
}
