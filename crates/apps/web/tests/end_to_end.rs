use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use foundation::{LngLat, SpotId, Viewport};
use pretty_assertions::assert_eq;
use scene::{CLUSTERS_LAYER, POINTS_LAYER, RecordingSurface, SOURCE_ID, SurfaceCall};
use storage::{InMemoryStore, KeyValueStore, StorageError};
use streaming::{HttpTransport, Method, ScriptedTransport, TransportError, VoteCounts};
use ui::{RecordingPresenter, SheetEvent, SheetStage};
use votes::{BootstrapSource, VoteKind};
use web::{
    LoadOutcome, MapConfig, MapContext, UiCommand, bootstrap_votes, load_viewport, toggle_vote,
};

type Ctx<T> = Rc<RefCell<MapContext<RecordingSurface, T, RecordingPresenter, InMemoryStore>>>;

const DESKTOP: f64 = 1280.0;
const PHONE: f64 = 390.0;

fn context_with<T: HttpTransport>(
    transport: T,
    votes: InMemoryStore,
    mirror: Option<Box<dyn KeyValueStore>>,
) -> Ctx<T> {
    Rc::new(RefCell::new(MapContext::new(
        MapConfig::default(),
        RecordingSurface::new(),
        Rc::new(transport),
        RecordingPresenter::new(),
        votes,
        mirror,
    )))
}

fn scripted(listing: &str) -> Ctx<ScriptedTransport> {
    let transport = ScriptedTransport::new();
    transport.route(Method::Get, "/spots.json", Ok(listing.to_string()));
    context_with(transport, InMemoryStore::new(), None)
}

fn load<T: HttpTransport>(ctx: &Ctx<T>) -> LoadOutcome {
    pollster::block_on(load_viewport(ctx, || std::future::ready(())))
}

fn click_spot<T: HttpTransport>(ctx: &Ctx<T>, id: &str, position: LngLat, width: f64) {
    let mut guard = ctx.borrow_mut();
    let surface = guard.surface_mut();
    surface.clear_hits();
    surface.add_hit(RecordingSurface::point_hit(POINTS_LAYER, id, position));
    guard.handle_click(scene::ScreenPoint::new(100.0, 100.0), width);
}

#[test]
fn single_spot_listing_to_optimistic_like() {
    let ctx = scripted(
        r#"[{"id":1,"name":"Café Lomi","address":"3 ter rue Marcadet","lat":48.85,"lng":2.35,
             "likes_count":4,"dislikes_count":1}]"#,
    );
    ctx.borrow().transport().route(
        Method::Delete,
        "/spots/1/dislike",
        Ok(r#"{"likes_count":4,"dislikes_count":1}"#.into()),
    );
    ctx.borrow().transport().route(
        Method::Post,
        "/spots/1/like",
        Ok(r#"{"likes_count":9,"dislikes_count":1}"#.into()),
    );

    assert!(matches!(load(&ctx), LoadOutcome::Rendered { points: 1, .. }));
    assert_eq!(ctx.borrow().surface().feature_count(SOURCE_ID), 1);

    click_spot(&ctx, "1", LngLat::new(2.35, 48.85), DESKTOP);
    {
        let guard = ctx.borrow();
        let view = guard.presenter().last_shown().unwrap();
        assert_eq!(view.title, "Café Lomi");
        assert_eq!(view.address, "3 ter rue Marcadet");
        assert!(view.to_html().contains("Café Lomi"));
    }

    let id = SpotId::from(1);
    let counts = pollster::block_on(toggle_vote(&ctx, id.clone(), VoteKind::Like));

    let guard = ctx.borrow();
    let requests: Vec<_> = guard.transport().requests().into_iter().skip(1).collect();
    assert_eq!(
        requests,
        vec![
            (Method::Delete, "/spots/1/dislike".to_string()),
            (Method::Post, "/spots/1/like".to_string()),
        ]
    );
    // The optimistic update reaches the view before the server's counts.
    assert_eq!(
        guard.presenter().vote_updates,
        vec![
            (id.clone(), Some(VoteKind::Like), VoteCounts::new(5, 1)),
            (id.clone(), Some(VoteKind::Like), VoteCounts::new(9, 1)),
        ]
    );
    assert_eq!(counts, Some(VoteCounts::new(9, 1)));
    assert_eq!(guard.votes().get_vote(&id), Some(VoteKind::Like));
}

#[test]
fn unvoting_issues_two_idempotent_deletes() {
    let mut storage = InMemoryStore::new();
    storage.set("spotVotes", r#"{"likes":["7"],"dislikes":[]}"#).unwrap();
    let transport = ScriptedTransport::new();
    transport.route(
        Method::Delete,
        "/spots/7/dislike",
        Ok(r#"{"likes_count":3,"dislikes_count":0}"#.into()),
    );
    transport.route(
        Method::Delete,
        "/spots/7/like",
        Ok(r#"{"likes_count":2,"dislikes_count":0}"#.into()),
    );
    let ctx = context_with(transport, storage, None);

    let id = SpotId::from(7);
    assert_eq!(ctx.borrow().votes().get_vote(&id), Some(VoteKind::Like));
    pollster::block_on(toggle_vote(&ctx, id.clone(), VoteKind::Like));

    let guard = ctx.borrow();
    assert_eq!(guard.votes().get_vote(&id), None);
    assert_eq!(
        guard.transport().requests(),
        vec![
            (Method::Delete, "/spots/7/dislike".to_string()),
            (Method::Delete, "/spots/7/like".to_string()),
        ]
    );
    assert_eq!(
        guard.votes().storage().get("spotVotes").unwrap().unwrap(),
        r#"{"likes":[],"dislikes":[]}"#
    );
}

#[test]
fn failed_vote_sync_keeps_local_intent() {
    let ctx = scripted(r#"[{"id":3,"lat":48.85,"lng":2.35,"likes_count":1}]"#);
    load(&ctx);
    let counts = pollster::block_on(toggle_vote(&ctx, SpotId::from(3), VoteKind::Dislike));

    let guard = ctx.borrow();
    assert_eq!(guard.votes().get_vote(&SpotId::from(3)), Some(VoteKind::Dislike));
    assert_eq!(counts, Some(VoteCounts::new(1, 1)));
}

#[test]
fn out_of_range_coordinates_are_dropped() {
    let ctx = scripted(
        r#"[
            {"id":1,"lat":48.85,"lng":2.35},
            {"id":2,"lat":120.5,"lng":48.86},
            {"id":3,"lat":"48.87","lng":"2.37"},
            {"id":4,"lat":200,"lng":100},
            {"id":5,"lat":-95,"lng":500}
        ]"#,
    );
    assert!(matches!(load(&ctx), LoadOutcome::Rendered { points: 3, .. }));
    let guard = ctx.borrow();
    assert_eq!(guard.surface().feature_count(SOURCE_ID), 3);
    assert_eq!(guard.spot(&SpotId::from(2)).unwrap().position, LngLat::new(120.5, 48.86));
    assert_eq!(guard.presenter().spot_count, Some(3));
}

/// Holds every listing response until the test releases it.
#[derive(Default)]
struct GatedTransport {
    gates: RefCell<BTreeMap<String, Rc<RefCell<Option<String>>>>>,
    requested: RefCell<Vec<String>>,
}

impl GatedTransport {
    fn gate(&self, url: &str) -> Rc<RefCell<Option<String>>> {
        Rc::clone(self.gates.borrow_mut().entry(url.to_string()).or_default())
    }

    fn release(&self, url: &str, body: &str) {
        *self.gate(url).borrow_mut() = Some(body.to_string());
    }
}

struct Gate(Rc<RefCell<Option<String>>>);

impl Future for Gate {
    type Output = String;

    fn poll(self: std::pin::Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<String> {
        match self.0.borrow_mut().take() {
            Some(body) => Poll::Ready(body),
            None => Poll::Pending,
        }
    }
}

impl HttpTransport for GatedTransport {
    async fn send(&self, _method: Method, url: &str) -> Result<String, TransportError> {
        self.requested.borrow_mut().push(url.to_string());
        Ok(Gate(self.gate(url)).await)
    }
}

fn poll_once<F: Future>(fut: std::pin::Pin<&mut F>) -> Poll<F::Output> {
    fut.poll(&mut Context::from_waker(Waker::noop()))
}

/// Holds the first vote request until released; later ones answer at once.
#[derive(Default)]
struct FirstHeldTransport {
    held: Rc<RefCell<Option<String>>>,
    log: RefCell<Vec<(Method, String)>>,
}

impl HttpTransport for FirstHeldTransport {
    async fn send(&self, method: Method, url: &str) -> Result<String, TransportError> {
        let first = {
            let mut log = self.log.borrow_mut();
            log.push((method, url.to_string()));
            log.len() == 1
        };
        if first {
            Ok(Gate(Rc::clone(&self.held)).await)
        } else {
            Ok("{}".to_string())
        }
    }
}

#[test]
fn overlapping_toggles_converge_on_the_last_vote() {
    let ctx = context_with(FirstHeldTransport::default(), InMemoryStore::new(), None);
    let id = SpotId::from(7);

    // Like: its first request stays in flight.
    let mut like = pin!(toggle_vote(&ctx, id.clone(), VoteKind::Like));
    assert!(poll_once(like.as_mut()).is_pending());

    // Un-like, synced completely before the first toggle resumes.
    pollster::block_on(toggle_vote(&ctx, id.clone(), VoteKind::Like));
    *ctx.borrow().transport().held.borrow_mut() = Some("{}".to_string());
    assert!(poll_once(like.as_mut()).is_ready());

    let guard = ctx.borrow();
    assert_eq!(guard.votes().get_vote(&id), None);
    let log = guard.transport().log.borrow().clone();
    assert_eq!(
        log,
        vec![
            (Method::Delete, "/spots/7/dislike".to_string()),
            (Method::Delete, "/spots/7/dislike".to_string()),
            (Method::Delete, "/spots/7/like".to_string()),
            (Method::Delete, "/spots/7/like".to_string()),
        ]
    );
    assert!(!log.iter().any(|(method, _)| *method == Method::Post));
}

#[test]
fn only_the_latest_viewport_is_applied() {
    let ctx = context_with(GatedTransport::default(), InMemoryStore::new(), None);

    let mut first = pin!(load_viewport(&ctx, || std::future::ready(())));
    assert!(poll_once(first.as_mut()).is_pending());

    ctx.borrow_mut()
        .surface_mut()
        .set_viewport(Viewport::new(4.0, 45.0, 5.0, 46.0));
    let mut second = pin!(load_viewport(&ctx, || std::future::ready(())));
    assert!(poll_once(second.as_mut()).is_pending());

    let (url_a, url_b) = {
        let guard = ctx.borrow();
        let requested = guard.transport().requested.borrow();
        assert_eq!(requested.len(), 2);
        (requested[0].clone(), requested[1].clone())
    };
    assert!(url_b.ends_with("bounds=4,45,5,46"));

    ctx.borrow()
        .transport()
        .release(&url_b, r#"[{"id":"b1","lat":45.5,"lng":4.5}]"#);
    assert!(matches!(
        poll_once(second.as_mut()),
        Poll::Ready(LoadOutcome::Rendered { points: 1, .. })
    ));

    ctx.borrow().transport().release(
        &url_a,
        r#"[{"id":"a1","lat":48.5,"lng":2.5},{"id":"a2","lat":48.6,"lng":2.6}]"#,
    );
    assert!(matches!(poll_once(first.as_mut()), Poll::Ready(LoadOutcome::Superseded)));

    let guard = ctx.borrow();
    assert_eq!(guard.surface().feature_count(SOURCE_ID), 1);
    assert!(guard.spot(&SpotId::new("b1").unwrap()).is_some());
    assert!(guard.spot(&SpotId::new("a1").unwrap()).is_none());
}

#[test]
fn read_failure_keeps_previous_render() {
    let ctx = scripted(r#"[{"id":1,"lat":48.85,"lng":2.35},{"id":2,"lat":48.86,"lng":2.36}]"#);
    load(&ctx);
    ctx.borrow().transport().push(
        Method::Get,
        "/spots.json",
        Err(TransportError::Network("offline".into())),
    );
    ctx.borrow_mut()
        .surface_mut()
        .set_viewport(Viewport::new(2.2, 48.7, 2.5, 48.9));

    assert!(matches!(load(&ctx), LoadOutcome::Failed(_)));
    let guard = ctx.borrow();
    assert_eq!(guard.spot_count(), 2);
    assert_eq!(guard.surface().feature_count(SOURCE_ID), 2);
    assert!(!guard.surface().is_loading());
}

#[test]
fn bottom_sheet_expands_on_scroll_once_per_open() {
    let ctx = scripted(r#"[{"id":1,"name":"Kawa","lat":48.85,"lng":2.35}]"#);
    load(&ctx);
    let at = LngLat::new(2.35, 48.85);

    click_spot(&ctx, "1", at, PHONE);
    let mut guard = ctx.borrow_mut();
    assert_eq!(guard.selection().sheet_stage(), SheetStage::Compact);

    guard.apply_ui(UiCommand::Sheet(SheetEvent::ContentScroll { scroll_top: 30.0 }));
    assert_eq!(guard.selection().sheet_stage(), SheetStage::Expanded);
    guard.apply_ui(UiCommand::Sheet(SheetEvent::HandleDrag { dy_px: 60.0 }));
    assert_eq!(guard.selection().sheet_stage(), SheetStage::Compact);
    guard.apply_ui(UiCommand::Sheet(SheetEvent::ContentScroll { scroll_top: 80.0 }));
    assert_eq!(guard.selection().sheet_stage(), SheetStage::Compact);

    guard.apply_ui(UiCommand::Close);
    drop(guard);
    click_spot(&ctx, "1", at, PHONE);
    let mut guard = ctx.borrow_mut();
    guard.apply_ui(UiCommand::Sheet(SheetEvent::ContentScroll { scroll_top: 30.0 }));
    assert_eq!(guard.selection().sheet_stage(), SheetStage::Expanded);
}

#[test]
fn cluster_click_expands_and_empty_click_closes() {
    let ctx = scripted(r#"[{"id":1,"lat":48.85,"lng":2.35}]"#);
    load(&ctx);
    click_spot(&ctx, "1", LngLat::new(2.35, 48.85), DESKTOP);

    let mut guard = ctx.borrow_mut();
    let center = LngLat::new(2.3, 48.8);
    guard.surface_mut().clear_hits();
    guard
        .surface_mut()
        .add_hit(RecordingSurface::cluster_hit(CLUSTERS_LAYER, 42, center));
    guard.handle_click(scene::ScreenPoint::new(5.0, 5.0), DESKTOP);
    assert!(guard
        .surface()
        .calls()
        .contains(&SurfaceCall::ExpandCluster { cluster_id: 42, center }));
    assert!(guard.selection().open_id().is_some());

    guard.surface_mut().clear_hits();
    guard.handle_click(scene::ScreenPoint::new(5.0, 5.0), DESKTOP);
    assert_eq!(guard.selection().open_id(), None);
    assert_eq!(guard.renderer().selected(), None);
}

#[test]
fn bootstrap_fills_votes_without_overriding_local_ones() {
    let mut storage = InMemoryStore::new();
    storage.set("spotVotes", r#"{"likes":[],"dislikes":["1"]}"#).unwrap();
    let transport = ScriptedTransport::new();
    transport.route(Method::Get, "/votes", Ok(r#"{"likes":[1,2],"dislikes":["3"]}"#.into()));
    let ctx = context_with(transport, storage, None);

    let report = pollster::block_on(bootstrap_votes(&ctx)).unwrap();
    assert_eq!(report.source, BootstrapSource::Combined);
    assert_eq!(report.added, 2);

    let guard = ctx.borrow();
    assert_eq!(guard.votes().get_vote(&SpotId::from(1)), Some(VoteKind::Dislike));
    assert_eq!(guard.votes().get_vote(&SpotId::from(2)), Some(VoteKind::Like));
    assert_eq!(guard.votes().get_vote(&SpotId::from(3)), Some(VoteKind::Dislike));
}

#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<InMemoryStore>>);

impl KeyValueStore for SharedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(key)
    }
}

#[test]
fn session_mirror_serves_a_reloaded_map() {
    let session = SharedStore::default();
    let listing = r#"[{"id":1,"lat":48.85,"lng":2.35}]"#;

    let transport = ScriptedTransport::new();
    transport.route(Method::Get, "/spots.json", Ok(listing.into()));
    let first = context_with(transport, InMemoryStore::new(), Some(Box::new(session.clone())));
    assert!(matches!(load(&first), LoadOutcome::Rendered { from_cache: false, .. }));

    let second =
        context_with(ScriptedTransport::new(), InMemoryStore::new(), Some(Box::new(session)));
    assert!(matches!(load(&second), LoadOutcome::Rendered { from_cache: true, points: 1, .. }));
    assert_eq!(second.borrow().transport().request_count(), 0);
}

#[test]
fn teardown_releases_everything() {
    let ctx = scripted(r#"[{"id":1,"lat":48.85,"lng":2.35}]"#);
    load(&ctx);
    click_spot(&ctx, "1", LngLat::new(2.35, 48.85), DESKTOP);

    ctx.borrow_mut().teardown();
    {
        let guard = ctx.borrow();
        assert!(guard.surface().is_removed());
        assert_eq!(guard.presenter().open, None);
        assert_eq!(guard.selection().open_id(), None);
        assert!(guard.surface().calls().ends_with(&[SurfaceCall::Remove]));
    }
    assert!(matches!(load(&ctx), LoadOutcome::Skipped));
    assert_eq!(ctx.borrow().transport().request_count(), 1);
}
