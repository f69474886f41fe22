use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },
    #[error("request aborted")]
    Aborted,
}

/// Minimal HTTP seam. Bodies are returned as text and decoded by the caller.
///
/// `fetch_latest` is the listing request: implementations that can cancel
/// in-flight work abort the previous listing request when a new one starts.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    async fn send(&self, method: Method, url: &str) -> Result<String, TransportError>;

    async fn fetch_latest(&self, url: &str) -> Result<String, TransportError> {
        self.send(Method::Get, url).await
    }

    /// Aborts the outstanding listing request, if any.
    fn abort_latest(&self) {}
}

impl<T: HttpTransport> HttpTransport for Rc<T> {
    async fn send(&self, method: Method, url: &str) -> Result<String, TransportError> {
        (**self).send(method, url).await
    }

    async fn fetch_latest(&self, url: &str) -> Result<String, TransportError> {
        (**self).fetch_latest(url).await
    }

    fn abort_latest(&self) {
        (**self).abort_latest()
    }
}

/// In-memory transport with scripted responses and a request log.
///
/// Responses are matched on method and the URL path (the query string is
/// ignored); queued responses are consumed in order, then the route's fallback
/// applies. Unrouted requests fail with a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: RefCell<BTreeMap<(Method, String), Route>>,
    log: RefCell<Vec<(Method, String)>>,
    aborts: RefCell<u32>,
}

#[derive(Debug, Default)]
struct Route {
    queued: VecDeque<Result<String, TransportError>>,
    fallback: Option<Result<String, TransportError>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds with `response` to every matching request.
    pub fn route(&self, method: Method, path: &str, response: Result<String, TransportError>) {
        self.routes
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .fallback = Some(response);
    }

    /// Responds with `response` to the next matching request only.
    pub fn push(&self, method: Method, path: &str, response: Result<String, TransportError>) {
        self.routes
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .queued
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn abort_count(&self) -> u32 {
        *self.aborts.borrow()
    }

    fn respond(&self, method: Method, url: &str) -> Result<String, TransportError> {
        self.log.borrow_mut().push((method, url.to_string()));
        let path = url.split('?').next().unwrap_or(url).to_string();
        let mut routes = self.routes.borrow_mut();
        let Some(route) = routes.get_mut(&(method, path)) else {
            return Err(TransportError::Status { status: 404 });
        };
        if let Some(next) = route.queued.pop_front() {
            return next;
        }
        route
            .fallback
            .clone()
            .unwrap_or(Err(TransportError::Status { status: 404 }))
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, method: Method, url: &str) -> Result<String, TransportError> {
        self.respond(method, url)
    }

    fn abort_latest(&self) {
        *self.aborts.borrow_mut() += 1;
    }
}
