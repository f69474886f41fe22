use std::collections::{BTreeMap, BTreeSet};

use foundation::SpotId;
use serde::{Deserialize, Serialize};
use storage::{KeyValueStore, StorageError, load_json, save_json};
use streaming::{HttpTransport, VoteCounts, VoteCountsPatch};

use crate::bootstrap::RemoteVoteSets;
use crate::state::{VoteKind, optimistic_counts, toggle};
use crate::sync::{SyncReport, VoteEndpoints, sync_vote};

pub const DEFAULT_VOTES_KEY: &str = "spotVotes";

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedVotes {
    #[serde(default)]
    likes: BTreeSet<String>,
    #[serde(default)]
    dislikes: BTreeSet<String>,
}

/// Result of a local toggle, before any network traffic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VoteChange {
    pub previous: Option<VoteKind>,
    pub current: Option<VoteKind>,
    pub counts: VoteCounts,
}

/// The visitor's votes plus the last known counts per spot.
///
/// Votes are persisted on every change, before any request is issued. Server
/// answers only ever update counts; the visitor's own choice changes through
/// [`apply_toggle`](Self::apply_toggle) alone (bootstrap fills gaps, never
/// overrides).
#[derive(Debug)]
pub struct VoteStore<S: KeyValueStore> {
    store: S,
    key: String,
    votes: BTreeMap<SpotId, VoteKind>,
    counts: BTreeMap<SpotId, VoteCounts>,
}

impl<S: KeyValueStore> VoteStore<S> {
    /// Restores persisted votes; an unreadable entry starts empty.
    pub fn load(store: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let persisted = match load_json::<PersistedVotes, _>(&store, &key) {
            Ok(p) => p.unwrap_or_default(),
            Err(err) => {
                tracing::warn!("ignoring stored votes: {err}");
                PersistedVotes::default()
            }
        };

        let mut votes = BTreeMap::new();
        for id in persisted.dislikes.iter().filter_map(SpotId::new) {
            votes.insert(id, VoteKind::Dislike);
        }
        // A spot listed in both sets resolves to a like.
        for id in persisted.likes.iter().filter_map(SpotId::new) {
            votes.insert(id, VoteKind::Like);
        }

        Self {
            store,
            key,
            votes,
            counts: BTreeMap::new(),
        }
    }

    pub fn get_vote(&self, id: &SpotId) -> Option<VoteKind> {
        self.votes.get(id).copied()
    }

    pub fn counts(&self, id: &SpotId) -> VoteCounts {
        self.counts.get(id).copied().unwrap_or_default()
    }

    /// Records counts reported by the listing endpoint.
    pub fn seed_counts(&mut self, id: SpotId, counts: VoteCounts) {
        self.counts.insert(id, counts);
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn ids_with(&self, kind: VoteKind) -> impl Iterator<Item = &SpotId> {
        self.votes
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(id, _)| id)
    }

    /// Flips the local vote and persists it. Storage failures are logged; the
    /// in-memory state still changes.
    pub fn apply_toggle(&mut self, id: &SpotId, target: VoteKind) -> VoteChange {
        let previous = self.get_vote(id);
        let current = toggle(previous, target);
        match current {
            Some(kind) => self.votes.insert(id.clone(), kind),
            None => self.votes.remove(id),
        };
        if let Err(err) = self.persist() {
            tracing::warn!("failed to persist votes: {err}");
        }

        let counts = optimistic_counts(self.counts(id), previous, current);
        self.counts.insert(id.clone(), counts);
        VoteChange {
            previous,
            current,
            counts,
        }
    }

    pub fn apply_server_counts(&mut self, id: &SpotId, patch: VoteCountsPatch) -> VoteCounts {
        let counts = self.counts(id).patched(patch);
        self.counts.insert(id.clone(), counts);
        counts
    }

    /// Folds in the server's record of this visitor's votes. Spots the visitor
    /// already voted on locally keep their local vote. Returns how many were added.
    pub fn merge_remote(&mut self, remote: &RemoteVoteSets) -> usize {
        let mut added = 0;
        let incoming = remote
            .likes
            .iter()
            .map(|id| (id, VoteKind::Like))
            .chain(remote.dislikes.iter().map(|id| (id, VoteKind::Dislike)));
        for (id, kind) in incoming {
            if !self.votes.contains_key(id) {
                self.votes.insert(id.clone(), kind);
                added += 1;
            }
        }
        if added > 0 {
            if let Err(err) = self.persist() {
                tracing::warn!("failed to persist votes: {err}");
            }
        }
        added
    }

    /// Local flip followed by server sync; returns the counts to display.
    pub async fn toggle_vote<T: HttpTransport>(
        &mut self,
        transport: &T,
        endpoints: &VoteEndpoints,
        id: &SpotId,
        target: VoteKind,
    ) -> VoteCounts {
        let change = self.apply_toggle(id, target);
        let report: SyncReport = sync_vote(transport, endpoints, id, || change.current).await;
        match report.counts {
            Some(patch) => self.apply_server_counts(id, patch),
            None => change.counts,
        }
    }

    pub fn persist(&mut self) -> Result<(), StorageError> {
        let persisted = PersistedVotes {
            likes: self
                .ids_with(VoteKind::Like)
                .map(|id| id.as_str().to_string())
                .collect(),
            dislikes: self
                .ids_with(VoteKind::Dislike)
                .map(|id| id.as_str().to_string())
                .collect(),
        };
        save_json(&mut self.store, &self.key, &persisted)
    }

    pub fn storage(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use storage::InMemoryStore;
    use streaming::{Method, ScriptedTransport, TransportError};

    fn id(n: u64) -> SpotId {
        SpotId::from(n)
    }

    fn empty_store() -> VoteStore<InMemoryStore> {
        VoteStore::load(InMemoryStore::new(), DEFAULT_VOTES_KEY)
    }

    /// Store that accepts reads but refuses writes.
    #[derive(Default)]
    struct ReadOnlyStore(InMemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("quota exceeded".into()))
        }
        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("quota exceeded".into()))
        }
    }

    #[test]
    fn toggle_persists_before_returning() {
        let mut votes = empty_store();
        let change = votes.apply_toggle(&id(3), VoteKind::Like);
        assert_eq!(change.previous, None);
        assert_eq!(change.current, Some(VoteKind::Like));
        assert_eq!(change.counts, VoteCounts::new(1, 0));
        assert_eq!(
            votes.storage().get(DEFAULT_VOTES_KEY).unwrap().as_deref(),
            Some(r#"{"likes":["3"],"dislikes":[]}"#)
        );
    }

    #[test]
    fn never_both_like_and_dislike() {
        let mut votes = empty_store();
        votes.apply_toggle(&id(1), VoteKind::Like);
        votes.apply_toggle(&id(1), VoteKind::Dislike);
        assert_eq!(votes.get_vote(&id(1)), Some(VoteKind::Dislike));
        assert_eq!(votes.ids_with(VoteKind::Like).count(), 0);
        assert_eq!(votes.counts(&id(1)), VoteCounts::new(0, 1));
    }

    #[test]
    fn reload_restores_votes() {
        let mut backing = InMemoryStore::new();
        backing
            .set(DEFAULT_VOTES_KEY, r#"{"likes":["7"],"dislikes":["8"]}"#)
            .unwrap();
        let votes = VoteStore::load(backing, DEFAULT_VOTES_KEY);
        assert_eq!(votes.get_vote(&id(7)), Some(VoteKind::Like));
        assert_eq!(votes.get_vote(&id(8)), Some(VoteKind::Dislike));
        assert_eq!(votes.get_vote(&id(9)), None);
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let mut backing = InMemoryStore::new();
        backing.set(DEFAULT_VOTES_KEY, "{not json").unwrap();
        assert!(VoteStore::load(backing, DEFAULT_VOTES_KEY).is_empty());
    }

    #[test]
    fn storage_failure_still_flips_in_memory() {
        let mut votes = VoteStore::load(ReadOnlyStore::default(), DEFAULT_VOTES_KEY);
        votes.apply_toggle(&id(2), VoteKind::Dislike);
        assert_eq!(votes.get_vote(&id(2)), Some(VoteKind::Dislike));
    }

    #[test]
    fn merge_keeps_local_choice() {
        let mut votes = empty_store();
        votes.apply_toggle(&id(1), VoteKind::Dislike);
        let remote = RemoteVoteSets {
            likes: [id(1), id(2)].into_iter().collect(),
            dislikes: [id(3)].into_iter().collect(),
        };
        assert_eq!(votes.merge_remote(&remote), 2);
        assert_eq!(votes.get_vote(&id(1)), Some(VoteKind::Dislike));
        assert_eq!(votes.get_vote(&id(2)), Some(VoteKind::Like));
        assert_eq!(votes.get_vote(&id(3)), Some(VoteKind::Dislike));
    }

    #[test]
    fn server_counts_override_optimistic_ones() {
        let t = ScriptedTransport::new();
        t.route(
            Method::Delete,
            "/spots/4/dislike",
            Ok(r#"{"likes_count":0,"dislikes_count":0}"#.into()),
        );
        t.route(
            Method::Post,
            "/spots/4/like",
            Ok(r#"{"likes_count":10,"dislikes_count":2}"#.into()),
        );

        let mut votes = empty_store();
        votes.seed_counts(id(4), VoteCounts::new(8, 2));
        let counts = pollster::block_on(votes.toggle_vote(
            &t,
            &VoteEndpoints::default(),
            &id(4),
            VoteKind::Like,
        ));
        assert_eq!(counts, VoteCounts::new(10, 2));
    }

    #[test]
    fn offline_toggle_keeps_optimistic_counts() {
        let t = ScriptedTransport::new();
        for (m, p) in [(Method::Delete, "/spots/4/dislike"), (Method::Post, "/spots/4/like")] {
            t.route(m, p, Err(TransportError::Network("offline".into())));
        }

        let mut votes = empty_store();
        votes.seed_counts(id(4), VoteCounts::new(8, 2));
        let counts = pollster::block_on(votes.toggle_vote(
            &t,
            &VoteEndpoints::default(),
            &id(4),
            VoteKind::Like,
        ));
        assert_eq!(counts, VoteCounts::new(9, 2));
        assert_eq!(votes.get_vote(&id(4)), Some(VoteKind::Like));
    }
}
