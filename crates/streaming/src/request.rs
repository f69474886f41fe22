use foundation::Viewport;
use runtime::Generation;

/// One issued listing request.
///
/// The generation is checked again after every suspension point; once a newer
/// ticket exists, this one's results are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub generation: Generation,
    pub url: String,
    pub viewport: Viewport,
    pub from_cache: bool,
}
