use foundation::SpotId;

/// At most one selected spot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<SpotId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SpotId> {
        self.selected.as_ref()
    }

    pub fn is_selected(&self, id: &SpotId) -> bool {
        self.selected.as_ref() == Some(id)
    }

    /// Selects `id`, returning the previously selected spot if it differs.
    pub fn select(&mut self, id: SpotId) -> Option<SpotId> {
        match self.selected.replace(id) {
            Some(prev) if Some(&prev) != self.selected.as_ref() => Some(prev),
            _ => None,
        }
    }

    pub fn clear(&mut self) -> Option<SpotId> {
        self.selected.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_replaces_previous() {
        let mut s = SelectionState::new();
        assert_eq!(s.select(SpotId::from(1)), None);
        assert_eq!(s.select(SpotId::from(2)), Some(SpotId::from(1)));
        assert!(s.is_selected(&SpotId::from(2)));
        assert!(!s.is_selected(&SpotId::from(1)));
    }

    #[test]
    fn reselecting_same_spot_reports_nothing_replaced() {
        let mut s = SelectionState::new();
        s.select(SpotId::from(1));
        assert_eq!(s.select(SpotId::from(1)), None);
        assert_eq!(s.clear(), Some(SpotId::from(1)));
        assert_eq!(s.current(), None);
    }
}
