use foundation::SpotId;
use streaming::VoteCounts;
use votes::VoteKind;

use crate::description::CollapsibleDescription;
use crate::detail::DetailView;
use crate::layout::SheetStage;

/// Where detail views are rendered: a DOM popup/sheet in the browser, a
/// recorder in tests.
pub trait DetailPresenter {
    /// Shows `view`, replacing whatever was open.
    fn show(&mut self, view: &DetailView);

    fn update_votes(&mut self, id: &SpotId, vote: Option<VoteKind>, counts: VoteCounts);

    /// Releases the open popup or sheet and its listeners.
    fn close(&mut self);

    fn set_spot_count(&mut self, n: usize);

    fn show_slide(&mut self, _index: usize) {}

    /// Reflects the description's collapsed state and toggle visibility.
    fn show_description(&mut self, _description: &CollapsibleDescription) {}

    fn show_sheet_stage(&mut self, _stage: SheetStage) {}
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub shown: Vec<DetailView>,
    pub open: Option<SpotId>,
    pub vote_updates: Vec<(SpotId, Option<VoteKind>, VoteCounts)>,
    pub closes: usize,
    pub spot_count: Option<usize>,
    pub slides: Vec<usize>,
    /// `(collapsed, shows_toggle)` per update.
    pub descriptions: Vec<(bool, bool)>,
    pub sheet_stages: Vec<SheetStage>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_shown(&self) -> Option<&DetailView> {
        self.shown.last()
    }
}

impl DetailPresenter for RecordingPresenter {
    fn show(&mut self, view: &DetailView) {
        self.open = Some(view.id.clone());
        self.shown.push(view.clone());
    }

    fn update_votes(&mut self, id: &SpotId, vote: Option<VoteKind>, counts: VoteCounts) {
        self.vote_updates.push((id.clone(), vote, counts));
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            self.closes += 1;
        }
    }

    fn set_spot_count(&mut self, n: usize) {
        self.spot_count = Some(n);
    }

    fn show_slide(&mut self, index: usize) {
        self.slides.push(index);
    }

    fn show_description(&mut self, description: &CollapsibleDescription) {
        self.descriptions.push((description.is_collapsed(), description.shows_toggle()));
    }

    fn show_sheet_stage(&mut self, stage: SheetStage) {
        self.sheet_stages.push(stage);
    }
}
