/// Identifies one issued request in a last-request-wins sequence.
///
/// Small and copyable so it can travel with an async task and be checked when
/// the task resumes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

/// Cooperative cancellation for "only the newest request counts".
///
/// Issuing a new request supersedes every older one. Superseded requests are not
/// interrupted; their results are simply rejected by [`LatestOnly::is_current`]
/// when they eventually arrive.
#[derive(Debug, Default)]
pub struct LatestOnly {
    issued: u64,
    outstanding: Option<Generation>,
}

impl LatestOnly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new generation, superseding any outstanding one.
    ///
    /// Returns the new generation and the one it superseded, if any.
    pub fn begin(&mut self) -> (Generation, Option<Generation>) {
        self.issued += 1;
        let g = Generation(self.issued);
        let superseded = self.outstanding.replace(g);
        (g, superseded)
    }

    pub fn is_current(&self, g: Generation) -> bool {
        self.outstanding == Some(g)
    }

    /// Marks `g` as settled. Returns `false` if it had already been superseded.
    pub fn finish(&mut self, g: Generation) -> bool {
        if self.is_current(g) {
            self.outstanding = None;
            return true;
        }
        false
    }

    /// Supersedes everything outstanding without issuing a replacement.
    pub fn cancel_all(&mut self) -> Option<Generation> {
        self.issued += 1;
        self.outstanding.take()
    }

    pub fn outstanding(&self) -> Option<Generation> {
        self.outstanding
    }
}
