//! Desktop popup vs. mobile bottom sheet, and the bottom sheet's gesture
//! state machine.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MOBILE_MAX_WIDTH_PX: f64 = 480.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Anchored map popup (wide viewports).
    Popup,
    /// Bottom sheet with compact/expanded stages (narrow viewports).
    BottomSheet,
}

pub fn presentation_for_width(width_px: f64, mobile_max_width_px: f64) -> Presentation {
    if width_px <= mobile_max_width_px {
        Presentation::BottomSheet
    } else {
        Presentation::Popup
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Content scroll offset past which a compact sheet expands.
    pub scroll_expand_threshold_px: f64,
    /// Minimum upward swipe that expands a compact sheet.
    pub swipe_expand_threshold_px: f64,
    /// Delay before resizing the map, letting the CSS transition finish.
    pub resize_delay_ms: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            scroll_expand_threshold_px: 24.0,
            swipe_expand_threshold_px: 40.0,
            resize_delay_ms: 320,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SheetStage {
    Closed,
    Compact,
    Expanded,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SheetEvent {
    Open,
    /// Handle dragged by `dy_px` (negative is upwards). A tap is a zero drag.
    HandleDrag { dy_px: f64 },
    /// Upward swipe over the content; `content_scroll_top` is the content's
    /// scroll offset when the swipe started.
    SwipeUp { distance_px: f64, content_scroll_top: f64 },
    ContentScroll { scroll_top: f64 },
    Close,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SheetEffect {
    ResizeMap { delay_ms: u32 },
}

#[derive(Debug, Clone)]
pub struct BottomSheet {
    stage: SheetStage,
    config: SheetConfig,
    scroll_expanded: bool,
}

impl BottomSheet {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            stage: SheetStage::Closed,
            config,
            scroll_expanded: false,
        }
    }

    pub fn stage(&self) -> SheetStage {
        self.stage
    }

    pub fn handle(&mut self, event: SheetEvent) -> Option<SheetEffect> {
        use SheetStage::*;

        let next = match (self.stage, event) {
            (_, SheetEvent::Open) => {
                self.scroll_expanded = false;
                Compact
            }
            (_, SheetEvent::Close) => Closed,
            (Compact, SheetEvent::HandleDrag { dy_px }) if dy_px <= 0.0 => Expanded,
            (Expanded, SheetEvent::HandleDrag { dy_px })
                if dy_px >= self.config.swipe_expand_threshold_px =>
            {
                Compact
            }
            (
                Compact,
                SheetEvent::SwipeUp {
                    distance_px,
                    content_scroll_top,
                },
            ) if content_scroll_top <= 0.0
                && distance_px >= self.config.swipe_expand_threshold_px =>
            {
                Expanded
            }
            (Compact, SheetEvent::ContentScroll { scroll_top })
                if !self.scroll_expanded
                    && scroll_top > self.config.scroll_expand_threshold_px =>
            {
                self.scroll_expanded = true;
                Expanded
            }
            (stage, _) => stage,
        };

        if next == self.stage {
            return None;
        }
        self.stage = next;
        Some(SheetEffect::ResizeMap {
            delay_ms: self.config.resize_delay_ms,
        })
    }
}

/// Chooses the presentation per open and owns the sheet between opens.
#[derive(Debug, Clone)]
pub struct ResponsiveLayoutAdapter {
    mobile_max_width_px: f64,
    presentation: Option<Presentation>,
    sheet: BottomSheet,
}

impl ResponsiveLayoutAdapter {
    pub fn new(mobile_max_width_px: f64, sheet: SheetConfig) -> Self {
        Self {
            mobile_max_width_px,
            presentation: None,
            sheet: BottomSheet::new(sheet),
        }
    }

    pub fn presentation(&self) -> Option<Presentation> {
        self.presentation
    }

    pub fn sheet_stage(&self) -> SheetStage {
        self.sheet.stage()
    }

    pub fn open(&mut self, width_px: f64) -> (Presentation, Option<SheetEffect>) {
        let presentation = presentation_for_width(width_px, self.mobile_max_width_px);
        let effect = match presentation {
            Presentation::BottomSheet => self.sheet.handle(SheetEvent::Open),
            Presentation::Popup => self.sheet.handle(SheetEvent::Close),
        };
        self.presentation = Some(presentation);
        (presentation, effect)
    }

    /// Gesture input; ignored unless a bottom sheet is showing.
    pub fn sheet_event(&mut self, event: SheetEvent) -> Option<SheetEffect> {
        if self.presentation != Some(Presentation::BottomSheet) {
            return None;
        }
        self.sheet.handle(event)
    }

    pub fn close(&mut self) -> Option<SheetEffect> {
        self.presentation = None;
        self.sheet.handle(SheetEvent::Close)
    }
}

impl Default for ResponsiveLayoutAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MOBILE_MAX_WIDTH_PX, SheetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RESIZE: Option<SheetEffect> = Some(SheetEffect::ResizeMap { delay_ms: 320 });

    fn open_sheet() -> BottomSheet {
        let mut s = BottomSheet::new(SheetConfig::default());
        assert_eq!(s.handle(SheetEvent::Open), RESIZE);
        s
    }

    #[rstest]
    #[case(320.0, Presentation::BottomSheet)]
    #[case(480.0, Presentation::BottomSheet)]
    #[case(481.0, Presentation::Popup)]
    #[case(1280.0, Presentation::Popup)]
    fn presentation_follows_width(#[case] width: f64, #[case] expected: Presentation) {
        assert_eq!(presentation_for_width(width, DEFAULT_MOBILE_MAX_WIDTH_PX), expected);
    }

    #[test]
    fn sheet_opens_compact() {
        assert_eq!(open_sheet().stage(), SheetStage::Compact);
    }

    #[test]
    fn scroll_expands_exactly_once_per_open_cycle() {
        let mut s = open_sheet();
        assert_eq!(s.handle(SheetEvent::ContentScroll { scroll_top: 10.0 }), None);
        assert_eq!(s.handle(SheetEvent::ContentScroll { scroll_top: 30.0 }), RESIZE);
        assert_eq!(s.stage(), SheetStage::Expanded);

        // Collapsed again by the handle, further scrolling keeps it compact.
        assert_eq!(s.handle(SheetEvent::HandleDrag { dy_px: 80.0 }), RESIZE);
        assert_eq!(s.handle(SheetEvent::ContentScroll { scroll_top: 60.0 }), None);
        assert_eq!(s.stage(), SheetStage::Compact);

        // A new open cycle re-arms it.
        s.handle(SheetEvent::Close);
        s.handle(SheetEvent::Open);
        assert_eq!(s.handle(SheetEvent::ContentScroll { scroll_top: 60.0 }), RESIZE);
    }

    #[test]
    fn handle_drag_up_expands() {
        let mut s = open_sheet();
        assert_eq!(s.handle(SheetEvent::HandleDrag { dy_px: -15.0 }), RESIZE);
        assert_eq!(s.stage(), SheetStage::Expanded);
        assert_eq!(s.handle(SheetEvent::HandleDrag { dy_px: -15.0 }), None);
    }

    #[test]
    fn swipe_up_expands_only_from_top_of_content() {
        let mut s = open_sheet();
        let scrolled = SheetEvent::SwipeUp {
            distance_px: 100.0,
            content_scroll_top: 12.0,
        };
        assert_eq!(s.handle(scrolled), None);
        let short = SheetEvent::SwipeUp {
            distance_px: 10.0,
            content_scroll_top: 0.0,
        };
        assert_eq!(s.handle(short), None);
        let good = SheetEvent::SwipeUp {
            distance_px: 60.0,
            content_scroll_top: 0.0,
        };
        assert_eq!(s.handle(good), RESIZE);
        assert_eq!(s.stage(), SheetStage::Expanded);
    }

    #[test]
    fn gestures_are_ignored_when_closed() {
        let mut s = BottomSheet::new(SheetConfig::default());
        assert_eq!(s.handle(SheetEvent::HandleDrag { dy_px: -50.0 }), None);
        assert_eq!(s.handle(SheetEvent::ContentScroll { scroll_top: 99.0 }), None);
        assert_eq!(s.handle(SheetEvent::Close), None);
        assert_eq!(s.stage(), SheetStage::Closed);
    }

    #[test]
    fn adapter_only_routes_gestures_to_a_visible_sheet() {
        let mut a = ResponsiveLayoutAdapter::default();
        let (p, effect) = a.open(1024.0);
        assert_eq!(p, Presentation::Popup);
        assert_eq!(effect, None);
        assert_eq!(a.sheet_event(SheetEvent::HandleDrag { dy_px: -20.0 }), None);

        let (p, effect) = a.open(375.0);
        assert_eq!(p, Presentation::BottomSheet);
        assert_eq!(effect, RESIZE);
        assert_eq!(a.sheet_event(SheetEvent::HandleDrag { dy_px: -20.0 }), RESIZE);
        assert_eq!(a.close(), RESIZE);
        assert_eq!(a.presentation(), None);
        assert_eq!(a.sheet_stage(), SheetStage::Closed);
    }
}
