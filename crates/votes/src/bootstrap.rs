use std::collections::BTreeSet;

use foundation::SpotId;
use serde::Deserialize;
use serde_json::Value;
use streaming::{DecodeError, HttpTransport, Method, TransportError, spot_id_of};

/// The visitor's votes as the server remembers them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteVoteSets {
    pub likes: BTreeSet<SpotId>,
    pub dislikes: BTreeSet<SpotId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootstrapSource {
    /// The combined `/votes` endpoint answered.
    Combined,
    /// Assembled from `/likes` and `/dislikes`.
    Split,
}

/// What a bootstrap contributed to the local store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub source: BootstrapSource,
    /// Spots that had no local vote and took the server's.
    pub added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    #[error("no vote endpoint answered: {0}")]
    Unavailable(TransportError),
    #[error("vote list unreadable: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapUrls {
    pub votes: String,
    pub likes: String,
    pub dislikes: String,
}

impl Default for BootstrapUrls {
    fn default() -> Self {
        Self {
            votes: "/votes".into(),
            likes: "/likes".into(),
            dislikes: "/dislikes".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CombinedVotes {
    #[serde(default)]
    likes: Vec<Value>,
    #[serde(default)]
    dislikes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdList {
    Wrapped { spot_ids: Vec<Value> },
    Bare(Vec<Value>),
}

impl IdList {
    fn into_ids(self) -> BTreeSet<SpotId> {
        let (IdList::Wrapped { spot_ids: values } | IdList::Bare(values)) = self;
        ids_of(&values)
    }
}

fn ids_of(values: &[Value]) -> BTreeSet<SpotId> {
    values.iter().filter_map(spot_id_of).collect()
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, DecodeError> {
    serde_json::from_str(body).map_err(|e| DecodeError::Json(e.to_string()))
}

/// `{"likes": [...], "dislikes": [...]}`
pub fn decode_combined(body: &str) -> Result<RemoteVoteSets, DecodeError> {
    let v: CombinedVotes = decode(body)?;
    Ok(RemoteVoteSets {
        likes: ids_of(&v.likes),
        dislikes: ids_of(&v.dislikes),
    })
}

/// `{"spot_ids": [...]}` or a bare array.
pub fn decode_id_list(body: &str) -> Result<BTreeSet<SpotId>, DecodeError> {
    decode::<IdList>(body).map(IdList::into_ids)
}

/// Fetches prior votes, preferring the combined endpoint.
///
/// With the split endpoints, one failing side is treated as empty; only when
/// both fail is the bootstrap an error.
pub async fn fetch_remote_votes<T: HttpTransport>(
    transport: &T,
    urls: &BootstrapUrls,
) -> Result<(RemoteVoteSets, BootstrapSource), BootstrapError> {
    match transport.send(Method::Get, &urls.votes).await {
        Ok(body) => match decode_combined(&body) {
            Ok(sets) => return Ok((sets, BootstrapSource::Combined)),
            Err(err) => tracing::debug!("combined vote list unreadable, trying split lists: {err}"),
        },
        Err(err) => tracing::debug!("combined vote list unavailable, trying split lists: {err}"),
    }

    let likes = fetch_id_list(transport, &urls.likes).await;
    let dislikes = fetch_id_list(transport, &urls.dislikes).await;
    match (likes, dislikes) {
        (Err(a), Err(_)) => Err(a),
        (likes, dislikes) => Ok((
            RemoteVoteSets {
                likes: likes.unwrap_or_default(),
                dislikes: dislikes.unwrap_or_default(),
            },
            BootstrapSource::Split,
        )),
    }
}

async fn fetch_id_list<T: HttpTransport>(
    transport: &T,
    url: &str,
) -> Result<BTreeSet<SpotId>, BootstrapError> {
    let body = transport
        .send(Method::Get, url)
        .await
        .map_err(BootstrapError::Unavailable)?;
    Ok(decode_id_list(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use streaming::ScriptedTransport;

    fn fetch(t: &ScriptedTransport) -> Result<(RemoteVoteSets, BootstrapSource), BootstrapError> {
        pollster::block_on(fetch_remote_votes(t, &BootstrapUrls::default()))
    }

    fn ids(ns: &[u64]) -> BTreeSet<SpotId> {
        ns.iter().copied().map(SpotId::from).collect()
    }

    #[test]
    fn combined_endpoint_is_preferred() {
        let t = ScriptedTransport::new();
        t.route(Method::Get, "/votes", Ok(r#"{"likes":[1,"2"],"dislikes":[3]}"#.into()));

        let (sets, source) = fetch(&t).unwrap();
        assert_eq!(source, BootstrapSource::Combined);
        assert_eq!(sets.likes, ids(&[1, 2]));
        assert_eq!(sets.dislikes, ids(&[3]));
        assert_eq!(t.request_count(), 1);
    }

    #[test]
    fn falls_back_to_split_endpoints() {
        let t = ScriptedTransport::new();
        t.route(Method::Get, "/likes", Ok(r#"{"spot_ids":[4,5]}"#.into()));
        t.route(Method::Get, "/dislikes", Ok("[6]".into()));

        let (sets, source) = fetch(&t).unwrap();
        assert_eq!(source, BootstrapSource::Split);
        assert_eq!(sets.likes, ids(&[4, 5]));
        assert_eq!(sets.dislikes, ids(&[6]));
    }

    #[test]
    fn one_failing_split_endpoint_is_tolerated() {
        let t = ScriptedTransport::new();
        t.route(Method::Get, "/likes", Ok(r#"{"spot_ids":[4]}"#.into()));

        let (sets, _) = fetch(&t).unwrap();
        assert_eq!(sets.likes, ids(&[4]));
        assert!(sets.dislikes.is_empty());
    }

    #[test]
    fn nothing_answering_is_an_error() {
        let t = ScriptedTransport::new();
        let err = fetch(&t).unwrap_err();
        assert_eq!(err, BootstrapError::Unavailable(TransportError::Status { status: 404 }));
    }

    #[test]
    fn blank_ids_are_skipped() {
        assert_eq!(decode_id_list(r#"["", " ", 9]"#).unwrap(), ids(&[9]));
    }
}
