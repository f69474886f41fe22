pub const DEFAULT_COLLAPSED_PX: f64 = 60.0;

/// Collapsible description. The toggle is shown only when the content
/// measurably overflows its collapsed height.
#[derive(Debug, Clone, PartialEq)]
pub struct CollapsibleDescription {
    collapsed_px: f64,
    collapsed: bool,
    overflows: bool,
}

impl CollapsibleDescription {
    pub fn new(collapsed_px: f64) -> Self {
        Self {
            collapsed_px,
            collapsed: true,
            overflows: false,
        }
    }

    pub fn collapsed_px(&self) -> f64 {
        self.collapsed_px
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Records a measurement taken at the collapsed height: the content's full
    /// scroll height and the height actually visible. Returns whether the
    /// toggle should be shown.
    pub fn measure(&mut self, scroll_height: f64, client_height: f64) -> bool {
        self.overflows = scroll_height > client_height + 1.0;
        self.overflows
    }

    pub fn shows_toggle(&self) -> bool {
        self.overflows
    }

    /// Flips the state; returns `true` if now collapsed.
    pub fn toggle(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.collapsed { "Voir plus" } else { "Voir moins" }
    }

    /// CSS `max-height` for the current state.
    pub fn max_height_css(&self) -> String {
        if self.collapsed {
            format!("{}px", self.collapsed_px)
        } else {
            "none".to_string()
        }
    }
}

impl Default for CollapsibleDescription {
    fn default() -> Self {
        Self::new(DEFAULT_COLLAPSED_PX)
    }
}
