//! Wire format of the spot listing and vote endpoints.
//!
//! The listing endpoint is loosely typed: ids may be numbers or strings, tags and
//! image lists may be arrays, JSON-encoded arrays or comma-separated strings, and
//! coordinates may use either decimal separator or the wrong axis order. This
//! module is the single place where that is decoded into a strict [`Spot`];
//! records that cannot be decoded are dropped here and never reach the renderer.

use foundation::{CoordinateNormalizer, LngLat, RawCoord, SpotId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of images shown per spot.
pub const MAX_IMAGES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("expected a JSON array of spots")]
    NotAnArray,
}

/// Why a single record was dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    MissingId,
    InvalidPosition,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    #[serde(rename = "likes_count")]
    pub likes: u32,
    #[serde(rename = "dislikes_count")]
    pub dislikes: u32,
}

impl VoteCounts {
    pub const fn new(likes: u32, dislikes: u32) -> Self {
        Self { likes, dislikes }
    }

    /// Overlays whichever counts the server reported.
    pub fn patched(self, patch: VoteCountsPatch) -> Self {
        Self {
            likes: patch.likes_count.unwrap_or(self.likes),
            dislikes: patch.dislikes_count.unwrap_or(self.dislikes),
        }
    }
}

/// Vote endpoint response. Older deployments only report `likes_count`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoteCountsPatch {
    #[serde(default)]
    pub likes_count: Option<u32>,
    #[serde(default)]
    pub dislikes_count: Option<u32>,
}

impl VoteCountsPatch {
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(body).map_err(|e| DecodeError::Json(e.to_string()))
    }
}

/// A validated point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub id: SpotId,
    pub name: String,
    pub address: String,
    pub description: String,
    pub button_link: Option<String>,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
    pub position: LngLat,
    pub counts: VoteCounts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpot {
    id: Value,
    slug: Value,
    name: Value,
    address: Value,
    description: Value,
    lat: Value,
    latitude: Value,
    lng: Value,
    longitude: Value,
    tags: Value,
    button_link: Value,
    image_urls: Value,
    image_url: Value,
    image_url1: Value,
    image_url2: Value,
    image_url3: Value,
    likes_count: Value,
    dislikes_count: Value,
}

/// Result of decoding one listing response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSpots {
    pub spots: Vec<Spot>,
    pub rejected: usize,
}

/// Splits a listing body into its records without validating them.
pub fn decode_spot_records(body: &str) -> Result<Vec<Value>, DecodeError> {
    let value: Value = serde_json::from_str(body).map_err(|e| DecodeError::Json(e.to_string()))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(DecodeError::NotAnArray),
    }
}

/// Decodes a listing body; individual bad records are counted, not fatal.
pub fn decode_spots(
    body: &str,
    normalizer: &mut CoordinateNormalizer,
) -> Result<DecodedSpots, DecodeError> {
    let records = decode_spot_records(body)?;
    let mut out = DecodedSpots::default();
    for record in records {
        match decode_spot(record, normalizer) {
            Ok(spot) => out.spots.push(spot),
            Err(reason) => {
                tracing::debug!("dropping spot record: {reason:?}");
                out.rejected += 1;
            }
        }
    }
    Ok(out)
}

pub fn decode_spot(
    record: Value,
    normalizer: &mut CoordinateNormalizer,
) -> Result<Spot, Rejection> {
    if !record.is_object() {
        return Err(Rejection::NotAnObject);
    }
    let raw: RawSpot = serde_json::from_value(record).map_err(|_| Rejection::NotAnObject)?;

    let id = spot_id_of(&raw.id)
        .or_else(|| spot_id_of(&raw.slug))
        .ok_or(Rejection::MissingId)?;

    let lng = raw_coord(first_present(&raw.lng, &raw.longitude));
    let lat = raw_coord(first_present(&raw.lat, &raw.latitude));
    let position = normalizer
        .normalize(&lng, &lat)
        .ok_or(Rejection::InvalidPosition)?;

    let image_urls = if raw.image_urls.is_null() {
        [&raw.image_url1, &raw.image_url2, &raw.image_url3, &raw.image_url]
            .into_iter()
            .filter_map(text_of)
            .collect()
    } else {
        normalize_array(&raw.image_urls)
    };

    Ok(Spot {
        id,
        name: text_of(&raw.name).unwrap_or_default(),
        address: text_of(&raw.address).unwrap_or_default(),
        description: text_of(&raw.description).unwrap_or_default(),
        button_link: text_of(&raw.button_link),
        image_urls: dedup_capped(image_urls, MAX_IMAGES),
        tags: normalize_tags(&raw.tags),
        position,
        counts: VoteCounts::new(count_of(&raw.likes_count), count_of(&raw.dislikes_count)),
    })
}

/// Reads an identifier that may be a JSON number or string.
pub fn spot_id_of(v: &Value) -> Option<SpotId> {
    match v {
        Value::Number(n) => SpotId::new(n.to_string()),
        Value::String(s) => SpotId::new(s),
        _ => None,
    }
}

/// Accepts an array, a JSON-encoded array or a comma-separated string.
pub fn normalize_array(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(text_of).collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().filter_map(text_of).collect(),
            _ => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        },
        _ => Vec::new(),
    }
}

/// Lowercases, trims and joins whitespace/hyphen runs with `_`; duplicates dropped.
pub fn normalize_tag(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut pending_sep = false;
    for c in tag.trim().chars() {
        if c.is_whitespace() || c == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

fn normalize_tags(v: &Value) -> Vec<String> {
    let tags = normalize_array(v)
        .iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect();
    dedup_capped(tags, usize::MAX)
}

fn dedup_capped(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len().min(cap));
    for item in items {
        if out.len() >= cap {
            break;
        }
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn first_present<'a>(primary: &'a Value, fallback: &'a Value) -> &'a Value {
    if primary.is_null() { fallback } else { primary }
}

fn raw_coord(v: &Value) -> RawCoord {
    match v {
        Value::Number(n) => n.as_f64().map_or(RawCoord::Missing, RawCoord::Number),
        Value::String(s) => RawCoord::Text(s.clone()),
        _ => RawCoord::Missing,
    }
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_of(v: &Value) -> u32 {
    let n = match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    n.map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn decode(v: Value) -> Result<Spot, Rejection> {
        decode_spot(v, &mut CoordinateNormalizer::new())
    }

    #[test]
    fn full_record_decodes() {
        let spot = decode(json!({
            "id": 1,
            "name": "Café Oberkampf",
            "address": "3 rue Neuve Popincourt",
            "description": "Flat white",
            "lat": 48.85,
            "lng": 2.35,
            "tags": ["Lumineux", "team-friendly"],
            "button_link": "https://example.com",
            "image_urls": ["https://img/1.jpg"],
            "likes_count": 4,
            "dislikes_count": 1
        }))
        .expect("valid record");

        assert_eq!(spot.id.as_str(), "1");
        assert_eq!(spot.position, LngLat::new(2.35, 48.85));
        assert_eq!(spot.tags, vec!["lumineux", "team_friendly"]);
        assert_eq!(spot.button_link.as_deref(), Some("https://example.com"));
        assert_eq!(spot.counts, VoteCounts::new(4, 1));
    }

    #[test]
    fn missing_id_is_rejected() {
        assert_eq!(
            decode(json!({ "lat": 48.85, "lng": 2.35 })).unwrap_err(),
            Rejection::MissingId
        );
        assert_eq!(
            decode(json!({ "id": "  ", "lat": 48.85, "lng": 2.35 })).unwrap_err(),
            Rejection::MissingId
        );
    }

    #[test]
    fn slug_stands_in_for_missing_id() {
        let spot = decode(json!({ "slug": "chez-marie", "lat": 48.85, "lng": 2.35 })).unwrap();
        assert_eq!(spot.id.as_str(), "chez-marie");
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        assert_eq!(
            decode(json!({ "id": 1, "lat": 100, "lng": 200 })).unwrap_err(),
            Rejection::InvalidPosition
        );
    }

    #[test]
    fn long_form_coordinate_names_and_text_values_are_accepted() {
        let spot = decode(json!({ "id": 2, "latitude": "48,85", "longitude": "2,35" })).unwrap();
        assert_eq!(spot.position, LngLat::new(2.35, 48.85));
    }

    #[test]
    fn non_object_records_are_rejected() {
        assert_eq!(decode(json!(42)).unwrap_err(), Rejection::NotAnObject);
    }

    #[rstest]
    #[case(json!(["a", "", "b"]), vec!["a", "b"])]
    #[case(json!("a, b ,,c"), vec!["a", "b", "c"])]
    #[case(json!("[\"x\",\"y\"]"), vec!["x", "y"])]
    #[case(json!(null), vec![])]
    #[case(json!(7), vec![])]
    fn arrays_are_normalized(#[case] input: Value, #[case] expected: Vec<&str>) {
        assert_eq!(normalize_array(&input), expected);
    }

    #[rstest]
    #[case("Service Continu", "service_continu")]
    #[case("  team - friendly ", "team_friendly")]
    #[case("SILENCIEUX", "silencieux")]
    fn tags_are_normalized(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_tag(input), expected);
    }

    #[test]
    fn image_urls_fall_back_to_discrete_fields() {
        let spot = decode(json!({
            "id": 3, "lat": 48.85, "lng": 2.35,
            "image_url1": "https://img/a.jpg",
            "image_url2": "",
            "image_url3": "https://img/a.jpg",
            "image_url": "https://img/b.jpg"
        }))
        .unwrap();
        assert_eq!(spot.image_urls, vec!["https://img/a.jpg", "https://img/b.jpg"]);
    }

    #[test]
    fn image_urls_are_capped_at_three() {
        let spot = decode(json!({
            "id": 3, "lat": 48.85, "lng": 2.35,
            "image_urls": "https://img/1.jpg,https://img/2.jpg,https://img/3.jpg,https://img/4.jpg"
        }))
        .unwrap();
        assert_eq!(spot.image_urls.len(), MAX_IMAGES);
    }

    #[test]
    fn listing_keeps_valid_records_and_counts_the_rest() {
        let body = json!([
            { "id": 1, "lat": 48.85, "lng": 2.35 },
            { "id": 2, "lat": 48.86, "lng": 2.36 },
            { "id": 3, "lat": 48.87, "lng": 2.37 },
            { "id": 4, "lat": 100, "lng": 200 },
            { "id": 5, "lat": "north", "lng": 2.0 },
            "garbage"
        ])
        .to_string();
        let decoded = decode_spots(&body, &mut CoordinateNormalizer::new()).unwrap();
        assert_eq!(decoded.spots.len(), 3);
        assert_eq!(decoded.rejected, 3);
    }

    #[test]
    fn non_array_listing_is_an_error() {
        let mut norm = CoordinateNormalizer::new();
        assert_eq!(
            decode_spots("{\"id\":1}", &mut norm).unwrap_err(),
            DecodeError::NotAnArray
        );
        assert!(matches!(decode_spots("<html>", &mut norm), Err(DecodeError::Json(_))));
    }

    #[test]
    fn vote_patch_overlays_reported_counts_only() {
        let patch = VoteCountsPatch::decode(r#"{"likes_count": 5}"#).unwrap();
        assert_eq!(VoteCounts::new(1, 2).patched(patch), VoteCounts::new(5, 2));
    }

    #[test]
    fn counts_accept_numeric_strings() {
        let spot = decode(json!({ "id": 1, "lat": 1, "lng": 1, "likes_count": "12" })).unwrap();
        assert_eq!(spot.counts.likes, 12);
        assert_eq!(spot.counts.dislikes, 0);
    }
}
