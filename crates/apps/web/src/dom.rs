//! Detail views rendered into the page: a map popup on wide screens, a bottom
//! sheet on narrow ones.

use std::cell::Cell;
use std::rc::Rc;

use foundation::SpotId;
use streaming::VoteCounts;
use ui::{
    CollapsibleDescription, DetailPresenter, DetailView, Presentation, SheetEvent, SheetStage,
    spots_label, votes_html,
};
use votes::VoteKind;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, MouseEvent, TouchEvent};

use crate::bridge::{js_message, spotmap_popup_close, spotmap_popup_element, spotmap_popup_open};
use crate::context::UiCommand;

/// What a detail view asks of the map context.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Ui(UiCommand),
    Vote(SpotId, VoteKind),
}

pub type Dispatch = Rc<dyn Fn(PresenterEvent)>;

/// A DOM listener that detaches itself when dropped.
pub(crate) struct EventListener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    pub(crate) fn new(
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(
                self.event,
                self.callback.as_ref().unchecked_ref(),
            );
    }
}

struct OpenView {
    id: SpotId,
    root: Element,
    popup: Option<JsValue>,
    listeners: Vec<EventListener>,
    _on_close: Option<Closure<dyn FnMut()>>,
}

impl Drop for OpenView {
    fn drop(&mut self) {
        match &self.popup {
            Some(popup) => spotmap_popup_close(popup),
            None => self.root.remove(),
        }
    }
}

pub struct DomPresenter {
    map: JsValue,
    counter: Option<Element>,
    dispatch: Dispatch,
    open: Option<OpenView>,
}

impl DomPresenter {
    pub fn new(map: JsValue, counter: Option<Element>, dispatch: Dispatch) -> Self {
        Self {
            map,
            counter,
            dispatch,
            open: None,
        }
    }

    /// `(scroll_height, client_height)` of the open description.
    pub fn measure_description(&self) -> Option<(f64, f64)> {
        let description = self.open.as_ref()?.root.query_selector(".mp-desc").ok()??;
        Some((
            f64::from(description.scroll_height()),
            f64::from(description.client_height()),
        ))
    }

    fn try_show(&mut self, view: &DetailView) -> Result<(), JsValue> {
        self.open = None;
        let html = view.to_html();

        let (root, popup, on_close) = match view.presentation {
            Presentation::Popup => {
                let dispatch = Rc::clone(&self.dispatch);
                let on_close = Closure::<dyn FnMut()>::new(move || {
                    dispatch(PresenterEvent::Ui(UiCommand::Close))
                });
                let popup = spotmap_popup_open(
                    &self.map,
                    view.position.lng,
                    view.position.lat,
                    &html,
                    on_close.as_ref().unchecked_ref(),
                )?;
                (spotmap_popup_element(&popup), Some(popup), Some(on_close))
            }
            Presentation::BottomSheet => (open_sheet(&html)?, None, None),
        };

        let open = self.open.insert(OpenView {
            id: view.id.clone(),
            root,
            popup,
            listeners: Vec::new(),
            _on_close: on_close,
        });
        open.listeners = content_listeners(&open.root, &view.id, &self.dispatch)?;
        if view.presentation == Presentation::BottomSheet {
            let sheet = sheet_listeners(&open.root, &self.dispatch)?;
            open.listeners.extend(sheet);
        }

        if let Some((scroll_height, client_height)) = self.measure_description() {
            (self.dispatch)(PresenterEvent::Ui(UiCommand::MeasureDescription {
                scroll_height,
                client_height,
            }));
        }
        Ok(())
    }
}

impl DetailPresenter for DomPresenter {
    fn show(&mut self, view: &DetailView) {
        if let Err(err) = self.try_show(view) {
            tracing::warn!("failed to show spot {}: {}", view.id, js_message(&err));
            self.open = None;
        }
    }

    fn update_votes(&mut self, id: &SpotId, vote: Option<VoteKind>, counts: VoteCounts) {
        let Some(open) = self.open.as_ref().filter(|o| &o.id == id) else {
            return;
        };
        if let Ok(Some(buttons)) = open.root.query_selector(".mp-votes") {
            buttons.set_outer_html(&votes_html(vote, counts));
        }
    }

    fn close(&mut self) {
        self.open = None;
    }

    fn set_spot_count(&mut self, n: usize) {
        if let Some(counter) = &self.counter {
            counter.set_text_content(Some(&spots_label(n)));
        }
    }

    fn show_slide(&mut self, index: usize) {
        let Some(open) = &self.open else {
            return;
        };
        let Ok(Some(carousel)) = open.root.query_selector(".mp-carousel") else {
            return;
        };
        let _ = carousel.set_attribute("data-active", &index.to_string());
        for (selector, attr) in [(".mpc-slide", "data-index"), (".mpc-dot", "data-to")] {
            for el in elements(&carousel, selector) {
                let active =
                    el.get_attribute(attr).and_then(|v| v.parse::<usize>().ok()) == Some(index);
                let _ = el.class_list().toggle_with_force("is-active", active);
            }
        }
    }

    fn show_description(&mut self, description: &CollapsibleDescription) {
        let Some(open) = &self.open else {
            return;
        };
        if let Ok(Some(text)) = open.root.query_selector(".mp-desc") {
            let style = format!("max-height:{};overflow:hidden;", description.max_height_css());
            let _ = text.set_attribute("style", &style);
            let _ = text.set_attribute("data-collapsed", &description.is_collapsed().to_string());
        }
        if let Ok(Some(link)) = open.root.query_selector(".mp-toggle-link") {
            let style = if description.shows_toggle() {
                "margin-top:6px;"
            } else {
                "display:none;margin-top:6px;"
            };
            let _ = link.set_attribute("style", style);
            let _ = link.set_attribute("aria-expanded", &(!description.is_collapsed()).to_string());
            link.set_text_content(Some(description.toggle_label()));
        }
    }

    fn show_sheet_stage(&mut self, stage: SheetStage) {
        let Some(open) = self.open.as_ref().filter(|o| o.popup.is_none()) else {
            return;
        };
        let classes = open.root.class_list();
        let _ = classes.toggle_with_force("spot-sheet--compact", stage == SheetStage::Compact);
        let _ = classes.toggle_with_force("spot-sheet--expanded", stage == SheetStage::Expanded);
    }
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

fn open_sheet(html: &str) -> Result<Element, JsValue> {
    let document = document()?;
    let sheet = document.create_element("div")?;
    sheet.set_class_name("spot-sheet spot-sheet--compact");
    sheet.set_attribute("role", "dialog")?;
    sheet.set_inner_html(&format!(
        concat!(
            r#"<div class="spot-sheet__handle" role="button" aria-label="Agrandir"></div>"#,
            r#"<button type="button" class="spot-sheet__close" aria-label="Fermer">×</button>"#,
            r#"<div class="spot-sheet__content">{}</div>"#
        ),
        html
    ));
    let body = document.body().ok_or_else(|| JsValue::from_str("document has no body"))?;
    body.append_child(&sheet)?;
    Ok(sheet)
}

fn elements(root: &Element, selector: &str) -> Vec<Element> {
    let Ok(list) = root.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn closest(target: &Element, selector: &str) -> Option<Element> {
    target.closest(selector).ok().flatten()
}

fn touch_point(event: &Event) -> Option<(f64, f64)> {
    let touch = event.dyn_ref::<TouchEvent>()?.changed_touches().get(0)?;
    Some((f64::from(touch.client_x()), f64::from(touch.client_y())))
}

fn click_event(event: &Event, id: &SpotId) -> Option<PresenterEvent> {
    let target = event_element(event)?;
    if let Some(button) = closest(&target, ".mp-vote") {
        let segment = button.get_attribute("data-vote")?;
        let kind = [VoteKind::Like, VoteKind::Dislike]
            .into_iter()
            .find(|k| k.path_segment() == segment)?;
        return Some(PresenterEvent::Vote(id.clone(), kind));
    }
    if let Some(nav) = closest(&target, ".mpc-nav") {
        let step = nav.get_attribute("data-dir")?.parse().ok()?;
        return Some(PresenterEvent::Ui(UiCommand::CarouselStep(step)));
    }
    if let Some(dot) = closest(&target, ".mpc-dot") {
        let index = dot.get_attribute("data-to")?.parse().ok()?;
        return Some(PresenterEvent::Ui(UiCommand::CarouselGoTo(index)));
    }
    if closest(&target, ".mp-toggle-link").is_some() {
        event.prevent_default();
        return Some(PresenterEvent::Ui(UiCommand::ToggleDescription));
    }
    if closest(&target, ".spot-sheet__close").is_some() {
        return Some(PresenterEvent::Ui(UiCommand::Close));
    }
    None
}

/// Votes, carousel and description, delegated from the view's root.
fn content_listeners(
    root: &Element,
    id: &SpotId,
    dispatch: &Dispatch,
) -> Result<Vec<EventListener>, JsValue> {
    let click = {
        let dispatch = Rc::clone(dispatch);
        let id = id.clone();
        EventListener::new(root, "click", move |event| {
            if let Some(e) = click_event(&event, &id) {
                dispatch(e);
            }
        })?
    };

    let in_carousel = |event: &Event| {
        event_element(event)
            .and_then(|t| closest(&t, ".mp-carousel"))
            .is_some()
    };

    let touch_start = {
        let dispatch = Rc::clone(dispatch);
        EventListener::new(root, "touchstart", move |event| {
            if let Some((x, _)) = touch_point(&event).filter(|_| in_carousel(&event)) {
                dispatch(PresenterEvent::Ui(UiCommand::CarouselTouchStart(x)));
            }
        })?
    };
    let touch_end = {
        let dispatch = Rc::clone(dispatch);
        EventListener::new(root, "touchend", move |event| {
            if let Some((x, _)) = touch_point(&event).filter(|_| in_carousel(&event)) {
                dispatch(PresenterEvent::Ui(UiCommand::CarouselTouchEnd(x)));
            }
        })?
    };

    Ok(vec![click, touch_start, touch_end])
}

/// Handle drags, content scroll and upward swipes on the bottom sheet.
fn sheet_listeners(sheet: &Element, dispatch: &Dispatch) -> Result<Vec<EventListener>, JsValue> {
    let mut listeners = Vec::new();
    let sheet_event = |dispatch: &Dispatch, event: SheetEvent| {
        dispatch(PresenterEvent::Ui(UiCommand::Sheet(event)))
    };

    if let Some(handle) = sheet.query_selector(".spot-sheet__handle")? {
        let drag_start = Rc::new(Cell::new(None::<f64>));
        let start = Rc::clone(&drag_start);
        listeners.push(EventListener::new(&handle, "pointerdown", move |event| {
            if let Some(pointer) = event.dyn_ref::<MouseEvent>() {
                start.set(Some(f64::from(pointer.client_y())));
            }
        })?);
        let dispatch = Rc::clone(dispatch);
        listeners.push(EventListener::new(&handle, "pointerup", move |event| {
            let (Some(from), Some(pointer)) = (drag_start.take(), event.dyn_ref::<MouseEvent>())
            else {
                return;
            };
            let dy_px = f64::from(pointer.client_y()) - from;
            sheet_event(&dispatch, SheetEvent::HandleDrag { dy_px });
        })?);
    }

    if let Some(content) = sheet.query_selector(".spot-sheet__content")? {
        {
            let dispatch = Rc::clone(dispatch);
            let scrolled = content.clone();
            listeners.push(EventListener::new(&content, "scroll", move |_| {
                let scroll_top = f64::from(scrolled.scroll_top());
                sheet_event(&dispatch, SheetEvent::ContentScroll { scroll_top });
            })?);
        }

        let swipe_start = Rc::new(Cell::new(None::<(f64, f64)>));
        {
            let start = Rc::clone(&swipe_start);
            let scrolled = content.clone();
            listeners.push(EventListener::new(&content, "touchstart", move |event| {
                if let Some((_, y)) = touch_point(&event) {
                    start.set(Some((y, f64::from(scrolled.scroll_top()))));
                }
            })?);
        }
        let dispatch = Rc::clone(dispatch);
        listeners.push(EventListener::new(&content, "touchend", move |event| {
            let (Some((from_y, content_scroll_top)), Some((_, y))) =
                (swipe_start.take(), touch_point(&event))
            else {
                return;
            };
            let distance_px = from_y - y;
            if distance_px > 0.0 {
                sheet_event(
                    &dispatch,
                    SheetEvent::SwipeUp {
                        distance_px,
                        content_scroll_top,
                    },
                );
            }
        })?);
    }

    Ok(listeners)
}
