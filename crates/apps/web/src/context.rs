//! Per-map state and the flows that drive it.
//!
//! A [`MapContext`] is created when a map mounts and torn down explicitly.
//! Async flows take it as `Rc<RefCell<_>>` and never hold a borrow across an
//! await, so DOM callbacks can reach the context while a request is pending.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

use foundation::SpotId;
use runtime::Generation;
use scene::{
    ClickAction, ClusterRenderer, Cursor, MapSurface, RenderReport, ScreenPoint, SurfaceError,
};
use storage::KeyValueStore;
use streaming::{
    BuiltFeatures, FeatureBuildJob, FetchError, FetchOutcome, FetchStep, HttpTransport,
    MemoryBudget, ResponseCache, Spot, SpotDataSource, VoteCounts, build_features,
};
use ui::{DetailPresenter, ResponsiveLayoutAdapter, SelectionController, SheetEffect, SheetEvent};
use votes::{
    BootstrapError, BootstrapReport, SyncReport, VoteEndpoints, VoteKind, VoteStore,
    fetch_remote_votes, sync_vote,
};

use crate::config::MapConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("rendering spots failed: {0}")]
    Render(#[from] SurfaceError),
}

#[derive(Debug)]
pub enum LoadOutcome {
    Rendered {
        generation: Generation,
        points: usize,
        from_cache: bool,
    },
    /// A newer viewport request took over.
    Superseded,
    Failed(LoadError),
    /// The context was already torn down.
    Skipped,
}

/// Interactions with the open detail view, raised by the DOM layer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UiCommand {
    CarouselStep(isize),
    CarouselGoTo(usize),
    CarouselTouchStart(f64),
    CarouselTouchEnd(f64),
    ToggleDescription,
    MeasureDescription { scroll_height: f64, client_height: f64 },
    Sheet(SheetEvent),
    Close,
}

pub struct MapContext<S, T, P, K>
where
    S: MapSurface,
    T: HttpTransport,
    P: DetailPresenter,
    K: KeyValueStore,
{
    config: MapConfig,
    surface: S,
    transport: Rc<T>,
    presenter: P,
    source: SpotDataSource,
    votes: VoteStore<K>,
    endpoints: VoteEndpoints,
    renderer: ClusterRenderer,
    selection: SelectionController,
    spots: BTreeMap<SpotId, Spot>,
    loaded_once: bool,
    loading_shown: bool,
    torn_down: bool,
}

impl<S, T, P, K> MapContext<S, T, P, K>
where
    S: MapSurface,
    T: HttpTransport,
    P: DetailPresenter,
    K: KeyValueStore,
{
    pub fn new(
        config: MapConfig,
        surface: S,
        transport: Rc<T>,
        presenter: P,
        vote_storage: K,
        session_mirror: Option<Box<dyn KeyValueStore>>,
    ) -> Self {
        let mut cache = ResponseCache::new(MemoryBudget::new(config.cache_budget_bytes));
        if let Some(mirror) = session_mirror {
            cache = cache.with_mirror(mirror);
        }
        let layout = ResponsiveLayoutAdapter::new(config.mobile_max_width_px, config.sheet);
        Self {
            source: SpotDataSource::new(config.api_url.clone(), cache),
            votes: VoteStore::load(vote_storage, config.votes_storage_key.clone()),
            endpoints: config.vote_endpoints(),
            renderer: ClusterRenderer::new(config.cluster, config.fit),
            selection: SelectionController::new(
                layout,
                config.select_ease,
                config.description_collapsed_px,
            ),
            config,
            surface,
            transport,
            presenter,
            spots: BTreeMap::new(),
            loaded_once: false,
            loading_shown: false,
            torn_down: false,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn transport(&self) -> &Rc<T> {
        &self.transport
    }

    pub fn votes(&self) -> &VoteStore<K> {
        &self.votes
    }

    pub fn renderer(&self) -> &ClusterRenderer {
        &self.renderer
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn source(&self) -> &SpotDataSource {
        &self.source
    }

    pub fn spot(&self, id: &SpotId) -> Option<&Spot> {
        self.spots.get(id)
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        !self.torn_down && self.source.is_current(generation)
    }

    fn begin_load(&mut self) -> Option<(FetchStep, Rc<T>)> {
        if self.torn_down {
            return None;
        }
        if !self.loaded_once && !self.loading_shown {
            self.surface.set_loading(true);
            self.loading_shown = true;
        }
        let viewport = self.surface.viewport();
        let step = self.source.begin(viewport);
        tracing::debug!("loading spots from {}", step.ticket().url);
        Some((step, Rc::clone(&self.transport)))
    }

    fn end_loading(&mut self) {
        if self.loading_shown {
            self.surface.set_loading(false);
            self.loading_shown = false;
        }
    }

    /// A superseded load leaves the indicator to its successor; an aborted
    /// load with no successor clears it.
    fn end_superseded(&mut self) -> LoadOutcome {
        if !self.torn_down && self.source.is_idle() {
            self.end_loading();
        }
        LoadOutcome::Superseded
    }

    /// Swaps the displayed spots for `built`.
    fn apply_features(&mut self, built: BuiltFeatures) -> Result<RenderReport, SurfaceError> {
        let report = self.renderer.render(&mut self.surface, &built.collection)?;
        self.spots = built.spots.into_iter().map(|s| (s.id.clone(), s)).collect();
        for spot in self.spots.values() {
            self.votes.seed_counts(spot.id.clone(), spot.counts);
        }
        self.presenter.set_spot_count(self.spots.len());
        self.loaded_once = true;
        Ok(report)
    }

    /// Routes a map click: select a spot, expand a cluster or close the detail view.
    pub fn handle_click(
        &mut self,
        point: ScreenPoint,
        viewport_width_px: f64,
    ) -> (ClickAction, Option<SheetEffect>) {
        if self.torn_down {
            return (ClickAction::Clear, None);
        }
        let action = self.renderer.route_click(&self.surface, point);
        let effect = match &action {
            ClickAction::SelectSpot { id, .. } => self.open_spot(id, viewport_width_px),
            ClickAction::ExpandCluster { cluster_id, center } => {
                self.renderer.expand_cluster(&mut self.surface, *cluster_id, *center);
                None
            }
            ClickAction::Clear => self.close_detail(),
        };
        (action, effect)
    }

    pub fn handle_hover(&mut self, point: ScreenPoint) -> Cursor {
        if self.torn_down {
            return Cursor::Default;
        }
        self.renderer.update_cursor(&mut self.surface, point)
    }

    pub fn open_spot(&mut self, id: &SpotId, viewport_width_px: f64) -> Option<SheetEffect> {
        let Some(spot) = self.spots.get(id) else {
            tracing::warn!("spot {id} is not loaded");
            return None;
        };
        let vote = self.votes.get_vote(id);
        let counts = self.votes.counts(id);
        let effect = self.selection.on_feature_click(
            &mut self.renderer,
            &mut self.surface,
            &mut self.presenter,
            spot,
            vote,
            counts,
            viewport_width_px,
        );
        self.presenter.show_sheet_stage(self.selection.sheet_stage());
        effect
    }

    pub fn close_detail(&mut self) -> Option<SheetEffect> {
        let effect =
            self.selection.close(&mut self.renderer, &mut self.surface, &mut self.presenter);
        self.presenter.show_sheet_stage(self.selection.sheet_stage());
        effect
    }

    pub fn apply_ui(&mut self, command: UiCommand) -> Option<SheetEffect> {
        if self.torn_down {
            return None;
        }
        match command {
            UiCommand::CarouselStep(delta) => {
                if let Some(carousel) = self.selection.carousel_mut() {
                    let index = carousel.go_to(carousel.active() as isize + delta);
                    self.presenter.show_slide(index);
                }
                None
            }
            UiCommand::CarouselGoTo(index) => {
                if let Some(carousel) = self.selection.carousel_mut() {
                    let index = carousel.go_to(index as isize);
                    self.presenter.show_slide(index);
                }
                None
            }
            UiCommand::CarouselTouchStart(x) => {
                if let Some(carousel) = self.selection.carousel_mut() {
                    carousel.touch_start(x);
                }
                None
            }
            UiCommand::CarouselTouchEnd(x) => {
                if let Some(carousel) = self.selection.carousel_mut() {
                    if carousel.touch_end(x) {
                        self.presenter.show_slide(carousel.active());
                    }
                }
                None
            }
            UiCommand::ToggleDescription => {
                if let Some(description) = self.selection.description_mut() {
                    description.toggle();
                    self.presenter.show_description(description);
                }
                None
            }
            UiCommand::MeasureDescription {
                scroll_height,
                client_height,
            } => {
                if let Some(description) = self.selection.description_mut() {
                    description.measure(scroll_height, client_height);
                    self.presenter.show_description(description);
                }
                None
            }
            UiCommand::Sheet(SheetEvent::Close) | UiCommand::Close => self.close_detail(),
            UiCommand::Sheet(event) => {
                let effect = self.selection.sheet_event(event);
                self.presenter.show_sheet_stage(self.selection.sheet_stage());
                effect
            }
        }
    }

    /// Flips the local vote and shows the optimistic counts.
    fn record_vote(&mut self, id: &SpotId, target: VoteKind) {
        let change = self.votes.apply_toggle(id, target);
        self.selection
            .on_vote_changed(&mut self.presenter, id, change.current, change.counts);
    }

    fn finish_vote(&mut self, id: &SpotId, report: SyncReport) -> VoteCounts {
        if !report.is_clean() {
            tracing::warn!(
                "vote sync for {id}: {} of {} requests failed",
                report.failures.len(),
                report.issued
            );
        }
        match report.counts {
            Some(patch) => {
                let counts = self.votes.apply_server_counts(id, patch);
                let vote = self.votes.get_vote(id);
                self.selection.on_vote_changed(&mut self.presenter, id, vote, counts);
                counts
            }
            None => self.votes.counts(id),
        }
    }

    pub fn resize(&mut self) {
        if !self.torn_down {
            self.surface.resize();
        }
    }

    /// Cancels pending work, closes the detail view and removes the map.
    /// Calling it again does nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.source.cancel_all();
        self.transport.abort_latest();
        self.selection.reset();
        self.presenter.close();
        self.renderer.teardown(&mut self.surface);
        tracing::debug!("map context torn down");
    }
}

/// Fetches and renders the spots inside the current viewport.
///
/// `yield_now` runs between feature batches; a load whose generation goes
/// stale in the meantime stops without touching the map.
pub async fn load_viewport<S, T, P, K, Y, Fut>(
    ctx: &Rc<RefCell<MapContext<S, T, P, K>>>,
    yield_now: Y,
) -> LoadOutcome
where
    S: MapSurface,
    T: HttpTransport,
    P: DetailPresenter,
    K: KeyValueStore,
    Y: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let begun = ctx.borrow_mut().begin_load();
    let Some((step, transport)) = begun else {
        return LoadOutcome::Skipped;
    };

    let (ticket, response) = match step {
        FetchStep::Cached { ticket, body } => (ticket, Ok(body)),
        FetchStep::Network(ticket) => {
            let response = transport.fetch_latest(&ticket.url).await;
            (ticket, response)
        }
    };

    let outcome = ctx.borrow_mut().source.complete(&ticket, response);
    let batch = match outcome {
        FetchOutcome::Applied(batch) => batch,
        FetchOutcome::Superseded => return ctx.borrow_mut().end_superseded(),
        FetchOutcome::Failed(err) => {
            tracing::warn!("{err}");
            ctx.borrow_mut().end_loading();
            return LoadOutcome::Failed(err.into());
        }
    };

    let generation = batch.generation;
    let from_cache = batch.from_cache;
    let batch_size = ctx.borrow().config.batch_size;
    let job = FeatureBuildJob::new(generation, batch.spots, batch_size);
    let built = build_features(job, yield_now, |g| ctx.borrow().is_current(g)).await;
    let Some(built) = built else {
        return ctx.borrow_mut().end_superseded();
    };

    let mut guard = ctx.borrow_mut();
    if !guard.is_current(generation) {
        return guard.end_superseded();
    }
    let result = guard.apply_features(built);
    guard.source.settle(generation);
    guard.end_loading();
    match result {
        Ok(report) => LoadOutcome::Rendered {
            generation,
            points: report.points,
            from_cache,
        },
        Err(err) => {
            tracing::warn!("rendering spots failed: {err}");
            LoadOutcome::Failed(err.into())
        }
    }
}

/// Toggles the visitor's vote, shows it at once and syncs it to the server.
///
/// Returns the final counts, or `None` if the context was torn down.
pub async fn toggle_vote<S, T, P, K>(
    ctx: &Rc<RefCell<MapContext<S, T, P, K>>>,
    id: SpotId,
    target: VoteKind,
) -> Option<VoteCounts>
where
    S: MapSurface,
    T: HttpTransport,
    P: DetailPresenter,
    K: KeyValueStore,
{
    let (transport, endpoints) = {
        let mut guard = ctx.borrow_mut();
        if guard.torn_down {
            return None;
        }
        guard.record_vote(&id, target);
        (Rc::clone(&guard.transport), guard.endpoints.clone())
    };

    // A newer toggle may land while a request is in flight; each request
    // follows the local vote as it stands when it is sent.
    let current = || ctx.borrow().votes.get_vote(&id);
    let report = sync_vote(transport.as_ref(), &endpoints, &id, current).await;

    let mut guard = ctx.borrow_mut();
    if guard.torn_down {
        return None;
    }
    Some(guard.finish_vote(&id, report))
}

/// Merges the votes the server remembers into the local store.
pub async fn bootstrap_votes<S, T, P, K>(
    ctx: &Rc<RefCell<MapContext<S, T, P, K>>>,
) -> Result<BootstrapReport, BootstrapError>
where
    S: MapSurface,
    T: HttpTransport,
    P: DetailPresenter,
    K: KeyValueStore,
{
    let (transport, urls) = {
        let guard = ctx.borrow();
        (Rc::clone(&guard.transport), guard.config.bootstrap_urls())
    };

    let (remote, source) = fetch_remote_votes(transport.as_ref(), &urls).await?;

    let mut guard = ctx.borrow_mut();
    let ctx = &mut *guard;
    let added = ctx.votes.merge_remote(&remote);
    if added > 0 {
        if let Some(id) = ctx.selection.open_id().cloned() {
            let vote = ctx.votes.get_vote(&id);
            let counts = ctx.votes.counts(&id);
            ctx.selection.on_vote_changed(&mut ctx.presenter, &id, vote, counts);
        }
    }
    tracing::debug!("vote bootstrap via {source:?}: {added} spots added");
    Ok(BootstrapReport { source, added })
}
