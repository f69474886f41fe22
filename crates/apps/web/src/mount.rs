//! Page entry points: mount a spot map into a container, destroy it later.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use scene::{ScreenPoint, SurfaceError};
use storage::{KeyValueStore, StorageArea, open_or_memory};
use ui::SheetEffect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Document, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit,
};

use crate::bridge::{JsMapSurface, js_message, spotmap_on, spotmap_on_load};
use crate::config::{ConfigError, MapConfig, require_token};
use crate::context::{MapContext, UiCommand, bootstrap_votes, load_viewport, toggle_vote};
use crate::dom::{Dispatch, DomPresenter, EventListener, PresenterEvent};
use crate::http::GlooTransport;
use crate::logging;

type WebContext = MapContext<JsMapSurface, GlooTransport, DomPresenter, Box<dyn KeyValueStore>>;

const LAZY_ROOT_MARGIN: &str = "200px";
const SPOTS_COUNTER_SELECTOR: &str = "[data-spots-counter]";
const CSRF_META: &str = "csrf-token";

#[derive(Debug, thiserror::Error)]
enum MountError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("map creation failed: {0}")]
    Surface(#[from] SurfaceError),
    #[error("{0}")]
    Dom(String),
}

impl From<JsValue> for MountError {
    fn from(err: JsValue) -> Self {
        MountError::Dom(js_message(&err))
    }
}

async fn yield_now() {
    let promise = js_sys::Promise::new(&mut |resolve, _| {
        let scheduled = web_sys::window()
            .map(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }
    });
    let _ = JsFuture::from(promise).await;
}

fn document() -> Result<Document, MountError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| MountError::Dom("no document".into()))
}

fn meta_content(document: &Document, name: &str) -> Option<String> {
    document
        .query_selector(&format!("meta[name=\"{name}\"]"))
        .ok()
        .flatten()
        .and_then(|m| m.get_attribute("content"))
}

fn viewport_width() -> f64 {
    web_sys::window()
        .and_then(|w| w.inner_width().ok())
        .and_then(|v| v.as_f64())
        .unwrap_or(1024.0)
}

/// Resizes the map once a sheet transition has settled.
fn schedule_effect(ctx: &Weak<RefCell<WebContext>>, effect: Option<SheetEffect>) {
    let Some(SheetEffect::ResizeMap { delay_ms }) = effect else {
        return;
    };
    let Some(window) = web_sys::window() else {
        return;
    };
    let ctx = ctx.clone();
    let callback = Closure::once_into_js(move || {
        if let Some(ctx) = ctx.upgrade() {
            if let Ok(mut guard) = ctx.try_borrow_mut() {
                guard.resize();
            }
        }
    });
    let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
    let _ = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay);
}

/// Presenter events run on the next task so DOM callbacks never re-enter a
/// borrowed context.
fn dispatcher(ctx: Weak<RefCell<WebContext>>) -> Dispatch {
    Rc::new(move |event: PresenterEvent| {
        let weak = ctx.clone();
        spawn_local(async move {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            match event {
                PresenterEvent::Vote(id, kind) => {
                    toggle_vote(&ctx, id, kind).await;
                }
                PresenterEvent::Ui(command) => {
                    let effect = match ctx.try_borrow_mut() {
                        Ok(mut guard) => guard.apply_ui(command),
                        Err(_) => {
                            tracing::debug!("dropped {command:?}: map busy");
                            None
                        }
                    };
                    schedule_effect(&weak, effect);
                }
            }
        });
    })
}

/// Everything a live map owns; dropping it detaches every callback.
struct Mounted {
    ctx: Rc<RefCell<WebContext>>,
    _map_callbacks: Vec<Closure<dyn FnMut(f64, f64)>>,
    _on_load: Closure<dyn FnMut()>,
    _listeners: Vec<EventListener>,
}

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>;

#[derive(Default)]
struct MountState {
    observer: Option<(IntersectionObserver, ObserverCallback)>,
    mounted: Option<Mounted>,
    destroyed: bool,
}

/// Document and window listeners: fullscreen changes resize the map, window
/// resizes re-measure the open description.
fn page_listeners(
    document: &Document,
    weak: &Weak<RefCell<WebContext>>,
) -> Result<Vec<EventListener>, MountError> {
    let mut listeners = Vec::new();
    for event in ["fullscreenchange", "webkitfullscreenchange"] {
        let weak = weak.clone();
        listeners.push(EventListener::new(document, event, move |_| {
            if let Some(ctx) = weak.upgrade() {
                if let Ok(mut guard) = ctx.try_borrow_mut() {
                    guard.resize();
                }
            }
        })?);
    }
    if let Some(window) = web_sys::window() {
        let weak = weak.clone();
        listeners.push(EventListener::new(&window, "resize", move |_| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            let measured = ctx.try_borrow().ok().and_then(|g| g.presenter().measure_description());
            if let (Some((scroll_height, client_height)), Ok(mut guard)) =
                (measured, ctx.try_borrow_mut())
            {
                guard.apply_ui(UiCommand::MeasureDescription {
                    scroll_height,
                    client_height,
                });
            }
        })?);
    }
    Ok(listeners)
}

fn init_map(container: HtmlElement, config: MapConfig) -> Result<Mounted, MountError> {
    let document = document()?;
    let token = require_token(meta_content(&document, &config.token_meta), &config.token_meta)?;
    let csrf = meta_content(&document, CSRF_META);
    let counter = document.query_selector(SPOTS_COUNTER_SELECTOR).ok().flatten();

    let surface = JsMapSurface::create(container, &token, &config.map_options())?;
    let map = surface.handle().clone();

    let ctx: Rc<RefCell<WebContext>> = Rc::new_cyclic(|weak| {
        let presenter = DomPresenter::new(map.clone(), counter, dispatcher(weak.clone()));
        RefCell::new(MapContext::new(
            config,
            surface,
            Rc::new(GlooTransport::new(csrf)),
            presenter,
            open_or_memory(StorageArea::Local),
            Some(open_or_memory(StorageArea::Session)),
        ))
    });
    let weak = Rc::downgrade(&ctx);

    // Nothing is registered on the map yet, so a failure here only has to
    // remove the map again.
    let listeners = match page_listeners(&document, &weak) {
        Ok(listeners) => listeners,
        Err(err) => {
            ctx.borrow_mut().teardown();
            return Err(err);
        }
    };

    let on_load = {
        let weak = weak.clone();
        Closure::<dyn FnMut()>::new(move || {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            spawn_local(async move {
                let outcome = load_viewport(&ctx, yield_now).await;
                tracing::debug!("initial load: {outcome:?}");
                match bootstrap_votes(&ctx).await {
                    Ok(report) => tracing::debug!("votes restored from server: {report:?}"),
                    Err(err) => tracing::info!("vote bootstrap skipped: {err}"),
                }
            });
        })
    };
    spotmap_on_load(&map, on_load.as_ref().unchecked_ref());

    let mut map_callbacks = Vec::new();

    let moveend = {
        let weak = weak.clone();
        Closure::<dyn FnMut(f64, f64)>::new(move |_, _| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            spawn_local(async move {
                load_viewport(&ctx, yield_now).await;
            });
        })
    };
    spotmap_on(&map, "moveend", moveend.as_ref().unchecked_ref());
    map_callbacks.push(moveend);

    let click = {
        let weak = weak.clone();
        Closure::<dyn FnMut(f64, f64)>::new(move |x, y| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            let effect = match ctx.try_borrow_mut() {
                Ok(mut guard) => guard.handle_click(ScreenPoint::new(x, y), viewport_width()).1,
                Err(_) => None,
            };
            schedule_effect(&weak, effect);
        })
    };
    spotmap_on(&map, "click", click.as_ref().unchecked_ref());
    map_callbacks.push(click);

    let hover = {
        let weak = weak.clone();
        Closure::<dyn FnMut(f64, f64)>::new(move |x, y| {
            if let Some(ctx) = weak.upgrade() {
                if let Ok(mut guard) = ctx.try_borrow_mut() {
                    guard.handle_hover(ScreenPoint::new(x, y));
                }
            }
        })
    };
    spotmap_on(&map, "mousemove", hover.as_ref().unchecked_ref());
    map_callbacks.push(hover);

    tracing::info!("spot map mounted");
    Ok(Mounted {
        ctx,
        _map_callbacks: map_callbacks,
        _on_load: on_load,
        _listeners: listeners,
    })
}

fn start_map(state: &Rc<RefCell<MountState>>, container: HtmlElement, config: MapConfig) {
    {
        let state = state.borrow();
        if state.destroyed || state.mounted.is_some() {
            return;
        }
    }
    match init_map(container, config) {
        Ok(mounted) => state.borrow_mut().mounted = Some(mounted),
        Err(err) => tracing::error!("spot map not mounted: {err}"),
    }
}

/// Calls `on_visible` once, when `container` comes within the root margin of
/// the viewport.
fn observe_once(
    container: &HtmlElement,
    on_visible: impl Fn() + 'static,
) -> Result<(IntersectionObserver, ObserverCallback), JsValue> {
    let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
        move |entries: js_sys::Array, observer: IntersectionObserver| {
            let visible = entries
                .iter()
                .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
                .any(|e| e.is_intersecting());
            if visible {
                observer.disconnect();
                on_visible();
            }
        },
    );
    let options = IntersectionObserverInit::new();
    options.set_root_margin(LAZY_ROOT_MARGIN);
    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)?;
    observer.observe(container);
    Ok((observer, callback))
}

/// A mounted (or pending) spot map, handed to the page.
#[wasm_bindgen]
pub struct SpotMap {
    state: Rc<RefCell<MountState>>,
}

#[wasm_bindgen]
impl SpotMap {
    #[wasm_bindgen(js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.state.borrow().mounted.is_some()
    }

    /// Cancels pending work, closes the detail view, removes the map and
    /// detaches every listener. Safe to call twice.
    pub fn destroy(&self) {
        let (observer, mounted) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            (state.observer.take(), state.mounted.take())
        };
        if let Some((observer, _callback)) = observer {
            observer.disconnect();
        }
        if let Some(mounted) = mounted {
            let busy = match mounted.ctx.try_borrow_mut() {
                Ok(mut guard) => {
                    guard.teardown();
                    false
                }
                Err(_) => true,
            };
            if busy {
                // Callbacks stay attached until the map is gone.
                spawn_local(async move {
                    if let Ok(mut guard) = mounted.ctx.try_borrow_mut() {
                        guard.teardown();
                    }
                    drop(mounted);
                });
            }
        }
        tracing::debug!("spot map destroyed");
    }
}

/// Mounts a spot map into `container`. `config` is a JSON object of
/// [`MapConfig`] fields; anything missing keeps its default.
#[wasm_bindgen]
pub fn mount(container: HtmlElement, config: Option<String>) -> SpotMap {
    let (config, problem) = match MapConfig::from_page(config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (MapConfig::default(), Some(err)),
    };
    logging::init(&config.log_level);
    if let Some(err) = problem {
        tracing::warn!("{err}; using defaults");
    }

    let state = Rc::new(RefCell::new(MountState::default()));
    let start = {
        let weak = Rc::downgrade(&state);
        let container = container.clone();
        let config = config.clone();
        move || {
            if let Some(state) = weak.upgrade() {
                start_map(&state, container.clone(), config.clone());
            }
        }
    };

    if !config.lazy {
        start();
    } else {
        match observe_once(&container, start.clone()) {
            Ok(observer) => state.borrow_mut().observer = Some(observer),
            Err(err) => {
                tracing::debug!("no IntersectionObserver ({}); mounting now", js_message(&err));
                start();
            }
        }
    }
    SpotMap { state }
}
