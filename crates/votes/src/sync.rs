use foundation::SpotId;
use streaming::{DecodeError, HttpTransport, Method, TransportError, VoteCountsPatch};

use crate::state::VoteKind;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Add(VoteKind),
    Remove(VoteKind),
}

impl SyncAction {
    pub fn method(self) -> Method {
        match self {
            SyncAction::Add(_) => Method::Post,
            SyncAction::Remove(_) => Method::Delete,
        }
    }

    pub fn kind(self) -> VoteKind {
        match self {
            SyncAction::Add(k) | SyncAction::Remove(k) => k,
        }
    }
}

/// Requests that bring the server in line with `state`.
///
/// Every endpoint is idempotent, so the plan depends only on the target state:
/// clear the opposite vote first, then assert the wanted one.
pub fn sync_plan(state: Option<VoteKind>) -> [SyncAction; 2] {
    match state {
        Some(kind) => [SyncAction::Remove(kind.other()), SyncAction::Add(kind)],
        None => [
            SyncAction::Remove(VoteKind::Dislike),
            SyncAction::Remove(VoteKind::Like),
        ],
    }
}

/// `{prefix}/{id}/like` and `{prefix}/{id}/dislike`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEndpoints {
    prefix: String,
}

impl VoteEndpoints {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, id: &SpotId, kind: VoteKind) -> String {
        format!("{}/{}/{}", self.prefix, id, kind.path_segment())
    }
}

impl Default for VoteEndpoints {
    fn default() -> Self {
        Self::new("/spots")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteSyncError {
    #[error("vote request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("vote response unreadable: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub issued: usize,
    pub failures: Vec<VoteSyncError>,
    /// Counts from the last request that answered successfully.
    pub counts: Option<VoteCountsPatch>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Brings the server in line with the local vote for `id`.
///
/// `current` is read before every request, so each step follows the vote as it
/// stands when the request leaves, not when the sync started. An older sync
/// that resumes after a newer toggle therefore sends the newer toggle's
/// requests and the server converges on the last local intent. Failures are
/// collected, never returned early: the local state already reflects the
/// visitor's intent.
pub async fn sync_vote<T, F>(
    transport: &T,
    endpoints: &VoteEndpoints,
    id: &SpotId,
    mut current: F,
) -> SyncReport
where
    T: HttpTransport,
    F: FnMut() -> Option<VoteKind>,
{
    let mut report = SyncReport::default();
    for step in 0..2 {
        let action = sync_plan(current())[step];
        let url = endpoints.url(id, action.kind());
        report.issued += 1;
        let result = match transport.send(action.method(), &url).await {
            Ok(body) => VoteCountsPatch::decode(&body).map_err(VoteSyncError::from),
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(patch) => report.counts = Some(patch),
            Err(err) => {
                tracing::debug!("{} {url} failed: {err}", action.method().as_str());
                report.failures.push(err);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use streaming::ScriptedTransport;

    #[test]
    fn plans_clear_the_opposite_vote_first() {
        assert_eq!(
            sync_plan(Some(VoteKind::Like)),
            [SyncAction::Remove(VoteKind::Dislike), SyncAction::Add(VoteKind::Like)]
        );
        assert_eq!(
            sync_plan(Some(VoteKind::Dislike)),
            [SyncAction::Remove(VoteKind::Like), SyncAction::Add(VoteKind::Dislike)]
        );
        assert_eq!(
            sync_plan(None),
            [SyncAction::Remove(VoteKind::Dislike), SyncAction::Remove(VoteKind::Like)]
        );
    }

    #[test]
    fn endpoint_urls() {
        let e = VoteEndpoints::new("/spots/");
        assert_eq!(e.url(&SpotId::from(7), VoteKind::Like), "/spots/7/like");
        assert_eq!(e.url(&SpotId::from(7), VoteKind::Dislike), "/spots/7/dislike");
    }

    #[test]
    fn every_request_is_issued_even_after_a_failure() {
        let t = ScriptedTransport::new();
        t.route(Method::Delete, "/spots/7/dislike", Err(TransportError::Network("offline".into())));
        t.route(Method::Post, "/spots/7/like", Ok(r#"{"likes_count": 5}"#.into()));

        let id = SpotId::from(7);
        let report = pollster::block_on(sync_vote(&t, &VoteEndpoints::default(), &id, || {
            Some(VoteKind::Like)
        }));

        assert_eq!(report.issued, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.counts.and_then(|c| c.likes_count), Some(5));
        assert_eq!(
            t.requests(),
            vec![
                (Method::Delete, "/spots/7/dislike".to_string()),
                (Method::Post, "/spots/7/like".to_string()),
            ]
        );
    }

    #[test]
    fn unreadable_responses_count_as_failures() {
        let t = ScriptedTransport::new();
        t.route(Method::Delete, "/spots/1/dislike", Ok("oops".into()));
        t.route(Method::Delete, "/spots/1/like", Ok("{}".into()));

        let report = pollster::block_on(sync_vote(
            &t,
            &VoteEndpoints::default(),
            &SpotId::from(1),
            || None,
        ));
        assert!(!report.is_clean());
        assert!(matches!(report.failures[0], VoteSyncError::Decode(_)));
        assert_eq!(report.counts, Some(VoteCountsPatch::default()));
    }

    #[test]
    fn each_step_follows_the_vote_at_send_time() {
        let t = ScriptedTransport::new();
        t.route(Method::Delete, "/spots/7/dislike", Ok("{}".into()));
        t.route(Method::Delete, "/spots/7/like", Ok(r#"{"likes_count": 3}"#.into()));

        // Liked when the sync starts, un-voted by the time the second request leaves.
        let states = std::cell::RefCell::new(vec![None, Some(VoteKind::Like)]);
        let report = pollster::block_on(sync_vote(
            &t,
            &VoteEndpoints::default(),
            &SpotId::from(7),
            || states.borrow_mut().pop().flatten(),
        ));

        assert!(report.is_clean());
        assert_eq!(
            t.requests(),
            vec![
                (Method::Delete, "/spots/7/dislike".to_string()),
                (Method::Delete, "/spots/7/like".to_string()),
            ]
        );
    }
}
