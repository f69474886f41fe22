/// Work budget for time-slicing bulk processing on the UI event loop.
///
/// Budgets are expressed in abstract work units (typically one record each)
/// rather than wall-clock time, so slicing stays deterministic and testable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkBudget {
    remaining_units: u32,
}

impl WorkBudget {
    pub fn new(units: u32) -> Self {
        Self {
            remaining_units: units,
        }
    }

    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units == 0
    }

    /// Attempts to consume `units` from the budget.
    ///
    /// Returns `true` if the budget had enough remaining units.
    pub fn try_consume(&mut self, units: u32) -> bool {
        if self.remaining_units < units {
            return false;
        }
        self.remaining_units -= units;
        true
    }
}

/// Splits `len` items into consecutive slices of at most `batch_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCursor {
    len: usize,
    next: usize,
    batch_size: usize,
}

impl BatchCursor {
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self {
            len,
            next: 0,
            batch_size: batch_size.max(1),
        }
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.len
    }

    pub fn processed(&self) -> usize {
        self.next
    }

    /// A fresh budget sized for one slice.
    pub fn slice_budget(&self) -> WorkBudget {
        WorkBudget::new(u32::try_from(self.batch_size).unwrap_or(u32::MAX))
    }

    /// Advances the cursor while `budget` allows, returning the covered range.
    pub fn advance(&mut self, budget: &mut WorkBudget) -> std::ops::Range<usize> {
        let start = self.next;
        while self.next < self.len && budget.try_consume(1) {
            self.next += 1;
        }
        start..self.next
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchCursor, WorkBudget};

    #[test]
    fn consumes_units() {
        let mut b = WorkBudget::new(3);
        assert!(b.try_consume(2));
        assert_eq!(b.remaining_units(), 1);
        assert!(!b.try_consume(2));
        assert_eq!(b.remaining_units(), 1);
        assert!(b.try_consume(1));
        assert!(b.is_exhausted());
    }

    #[test]
    fn cursor_slices_in_batches() {
        let mut cursor = BatchCursor::new(5, 2);
        let mut ranges = Vec::new();
        while !cursor.is_done() {
            let mut budget = cursor.slice_budget();
            ranges.push(cursor.advance(&mut budget));
        }
        assert_eq!(ranges, vec![0..2, 2..4, 4..5]);
        assert_eq!(cursor.processed(), 5);
    }

    #[test]
    fn zero_batch_size_still_makes_progress() {
        let mut cursor = BatchCursor::new(1, 0);
        let mut budget = cursor.slice_budget();
        assert_eq!(cursor.advance(&mut budget), 0..1);
        assert!(cursor.is_done());
    }
}
