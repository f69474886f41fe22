use foundation::SpotId;
use scene::{ClusterRenderer, MapSurface};
use serde::{Deserialize, Serialize};
use streaming::{Spot, VoteCounts};
use votes::VoteKind;

use crate::carousel::Carousel;
use crate::description::CollapsibleDescription;
use crate::detail::DetailView;
use crate::layout::{Presentation, ResponsiveLayoutAdapter, SheetEffect, SheetEvent, SheetStage};
use crate::presenter::DetailPresenter;

/// Camera move when a spot is selected.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectEase {
    /// Downward offset of the spot so the popup fits above it.
    pub offset_y_px: f64,
    pub duration_ms: u32,
}

impl Default for SelectEase {
    fn default() -> Self {
        Self {
            offset_y_px: 120.0,
            duration_ms: 300,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenDetail {
    id: SpotId,
    presentation: Presentation,
    carousel: Carousel,
    description: CollapsibleDescription,
}

/// The single open detail view and its sub-widgets.
#[derive(Debug, Clone)]
pub struct SelectionController {
    layout: ResponsiveLayoutAdapter,
    ease: SelectEase,
    description_collapsed_px: f64,
    open: Option<OpenDetail>,
}

impl SelectionController {
    pub fn new(
        layout: ResponsiveLayoutAdapter,
        ease: SelectEase,
        description_collapsed_px: f64,
    ) -> Self {
        Self {
            layout,
            ease,
            description_collapsed_px,
            open: None,
        }
    }

    pub fn open_id(&self) -> Option<&SpotId> {
        self.open.as_ref().map(|o| &o.id)
    }

    pub fn presentation(&self) -> Option<Presentation> {
        self.open.as_ref().map(|o| o.presentation)
    }

    /// Selects `spot`, highlights it, eases the camera and shows its detail view.
    #[allow(clippy::too_many_arguments)]
    pub fn on_feature_click<S, P>(
        &mut self,
        renderer: &mut ClusterRenderer,
        surface: &mut S,
        presenter: &mut P,
        spot: &Spot,
        vote: Option<VoteKind>,
        counts: VoteCounts,
        viewport_width_px: f64,
    ) -> Option<SheetEffect>
    where
        S: MapSurface + ?Sized,
        P: DetailPresenter + ?Sized,
    {
        if self.open.take().is_some() {
            presenter.close();
        }
        if let Err(err) = renderer.select_feature(surface, spot.id.clone()) {
            tracing::warn!("failed to highlight spot {}: {err}", spot.id);
        }
        renderer.focus(surface, spot.position, self.ease.offset_y_px, self.ease.duration_ms);

        let (presentation, effect) = self.layout.open(viewport_width_px);
        let view = DetailView::build(spot, vote, counts, presentation)
            .with_collapsed_height(self.description_collapsed_px);
        presenter.show(&view);
        self.open = Some(OpenDetail {
            id: spot.id.clone(),
            presentation,
            carousel: Carousel::new(view.images.len()),
            description: CollapsibleDescription::new(self.description_collapsed_px),
        });
        effect
    }

    /// Closes the detail view and clears the highlight. Safe to call when
    /// nothing is open.
    pub fn close<S, P>(
        &mut self,
        renderer: &mut ClusterRenderer,
        surface: &mut S,
        presenter: &mut P,
    ) -> Option<SheetEffect>
    where
        S: MapSurface + ?Sized,
        P: DetailPresenter + ?Sized,
    {
        if let Err(err) = renderer.clear_selection(surface) {
            tracing::warn!("failed to clear highlight: {err}");
        }
        if self.open.take().is_some() {
            presenter.close();
        }
        self.layout.close()
    }

    /// Pushes new counts to the open view if it shows `id`.
    pub fn on_vote_changed<P: DetailPresenter + ?Sized>(
        &self,
        presenter: &mut P,
        id: &SpotId,
        vote: Option<VoteKind>,
        counts: VoteCounts,
    ) -> bool {
        if self.open_id() != Some(id) {
            return false;
        }
        presenter.update_votes(id, vote, counts);
        true
    }

    pub fn sheet_stage(&self) -> SheetStage {
        self.layout.sheet_stage()
    }

    pub fn sheet_event(&mut self, event: SheetEvent) -> Option<SheetEffect> {
        if self.open.is_none() {
            return None;
        }
        self.layout.sheet_event(event)
    }

    pub fn carousel_mut(&mut self) -> Option<&mut Carousel> {
        self.open.as_mut().map(|o| &mut o.carousel)
    }

    pub fn description_mut(&mut self) -> Option<&mut CollapsibleDescription> {
        self.open.as_mut().map(|o| &mut o.description)
    }

    /// Drops the open view without touching renderer or presenter, for teardown.
    pub fn reset(&mut self) {
        self.open = None;
        self.layout.close();
    }
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new(
            ResponsiveLayoutAdapter::default(),
            SelectEase::default(),
            crate::description::DEFAULT_COLLAPSED_PX,
        )
    }
}
