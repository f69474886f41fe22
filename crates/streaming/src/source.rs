use foundation::{CoordinateNormalizer, Viewport};
use runtime::{Generation, LatestOnly};

use crate::cache::ResponseCache;
use crate::protocol::{DecodeError, Spot, decode_spots};
use crate::request::FetchTicket;
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("spot request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("spot response unreadable: {0}")]
    Decode(#[from] DecodeError),
}

/// What the caller must do to satisfy a [`SpotDataSource::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStep {
    /// The response was cached; complete with this body immediately.
    Cached { ticket: FetchTicket, body: String },
    /// Issue the listing request for `ticket.url`.
    Network(FetchTicket),
}

impl FetchStep {
    pub fn ticket(&self) -> &FetchTicket {
        match self {
            FetchStep::Cached { ticket, .. } | FetchStep::Network(ticket) => ticket,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotBatch {
    pub generation: Generation,
    pub spots: Vec<Spot>,
    pub rejected: usize,
    pub from_cache: bool,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Applied(SpotBatch),
    /// A newer request was issued while this one was in flight.
    Superseded,
    Failed(FetchError),
}

/// Fetches spots for a viewport with response caching and last-request-wins.
///
/// A request is split in two so no borrow has to live across the network
/// await: [`begin`](Self::begin) issues a ticket (superseding any older one)
/// and [`complete`](Self::complete) validates and decodes the body. An
/// `Applied` ticket stays current until [`settle`](Self::settle) so that later
/// stages of the same load can keep checking [`is_current`](Self::is_current).
#[derive(Debug)]
pub struct SpotDataSource {
    api_url: String,
    cache: ResponseCache,
    normalizer: CoordinateNormalizer,
    requests: LatestOnly,
}

impl SpotDataSource {
    pub fn new(api_url: impl Into<String>, cache: ResponseCache) -> Self {
        Self {
            api_url: api_url.into(),
            cache,
            normalizer: CoordinateNormalizer::new(),
            requests: LatestOnly::new(),
        }
    }

    pub fn url_for(&self, viewport: &Viewport) -> String {
        let sep = if self.api_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}bounds={}", self.api_url, viewport.to_query())
    }

    pub fn begin(&mut self, viewport: Viewport) -> FetchStep {
        let (generation, superseded) = self.requests.begin();
        if let Some(old) = superseded {
            tracing::debug!("spot request {} superseded by {}", old.0, generation.0);
        }

        let url = self.url_for(&viewport);
        match self.cache.get(&url) {
            Some(body) => FetchStep::Cached {
                ticket: FetchTicket {
                    generation,
                    url,
                    viewport,
                    from_cache: true,
                },
                body,
            },
            None => FetchStep::Network(FetchTicket {
                generation,
                url,
                viewport,
                from_cache: false,
            }),
        }
    }

    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        response: Result<String, TransportError>,
    ) -> FetchOutcome {
        if !self.requests.is_current(ticket.generation) {
            return FetchOutcome::Superseded;
        }

        let body = match response {
            Ok(body) => body,
            Err(TransportError::Aborted) => {
                self.requests.finish(ticket.generation);
                return FetchOutcome::Superseded;
            }
            Err(err) => {
                self.requests.finish(ticket.generation);
                return FetchOutcome::Failed(err.into());
            }
        };

        let decoded = match decode_spots(&body, &mut self.normalizer) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.requests.finish(ticket.generation);
                return FetchOutcome::Failed(err.into());
            }
        };

        if decoded.rejected > 0 {
            tracing::debug!(
                "{} of {} spot records dropped",
                decoded.rejected,
                decoded.rejected + decoded.spots.len()
            );
        }
        if !ticket.from_cache {
            self.cache.insert(&ticket.url, body);
        }

        FetchOutcome::Applied(SpotBatch {
            generation: ticket.generation,
            spots: decoded.spots,
            rejected: decoded.rejected,
            from_cache: ticket.from_cache,
        })
    }

    /// Whole fetch in one call, for callers that own the source exclusively.
    pub async fn fetch<T: HttpTransport>(
        &mut self,
        transport: &T,
        viewport: Viewport,
    ) -> FetchOutcome {
        match self.begin(viewport) {
            FetchStep::Cached { ticket, body } => self.complete(&ticket, Ok(body)),
            FetchStep::Network(ticket) => {
                let response = transport.fetch_latest(&ticket.url).await;
                self.complete(&ticket, response)
            }
        }
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.requests.is_current(generation)
    }

    /// No request is outstanding: the last one settled, failed or was aborted.
    pub fn is_idle(&self) -> bool {
        self.requests.outstanding().is_none()
    }

    /// Marks a load as fully applied. Returns `false` if it was superseded.
    pub fn settle(&mut self, generation: Generation) -> bool {
        self.requests.finish(generation)
    }

    /// Invalidates every outstanding request; their results will be discarded.
    pub fn cancel_all(&mut self) {
        if let Some(g) = self.requests.cancel_all() {
            tracing::debug!("spot request {} cancelled", g.0);
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn normalizer(&self) -> &CoordinateNormalizer {
        &self.normalizer
    }
}
