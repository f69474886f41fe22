use std::cell::RefCell;

use gloo_net::http::{Request, RequestBuilder};
use streaming::{HttpTransport, Method, TransportError};
use web_sys::{AbortController, AbortSignal};

use crate::bridge::js_message;

/// Browser `fetch` through gloo-net. Only the latest listing request can be
/// aborted; vote requests always run to completion.
pub struct GlooTransport {
    csrf_token: Option<String>,
    latest: RefCell<Option<AbortController>>,
}

impl GlooTransport {
    pub fn new(csrf_token: Option<String>) -> Self {
        Self {
            csrf_token,
            latest: RefCell::new(None),
        }
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = match method {
            Method::Get => Request::get(url),
            Method::Post => Request::post(url),
            Method::Delete => Request::delete(url),
        }
        .header("Accept", "application/json");

        match (&self.csrf_token, method) {
            (Some(token), Method::Post | Method::Delete) => builder.header("X-CSRF-Token", token),
            _ => builder,
        }
    }

    async fn execute(
        builder: RequestBuilder,
        signal: Option<&AbortSignal>,
    ) -> Result<String, TransportError> {
        let aborted = || signal.is_some_and(AbortSignal::aborted);
        let response = builder.abort_signal(signal).send().await.map_err(|err| {
            if aborted() {
                TransportError::Aborted
            } else {
                TransportError::Network(err.to_string())
            }
        })?;
        if !response.ok() {
            return Err(TransportError::Status {
                status: response.status(),
            });
        }
        response.text().await.map_err(|err| {
            if aborted() {
                TransportError::Aborted
            } else {
                TransportError::Network(err.to_string())
            }
        })
    }
}

impl HttpTransport for GlooTransport {
    async fn send(&self, method: Method, url: &str) -> Result<String, TransportError> {
        Self::execute(self.builder(method, url), None).await
    }

    async fn fetch_latest(&self, url: &str) -> Result<String, TransportError> {
        self.abort_latest();
        let controller =
            AbortController::new().map_err(|e| TransportError::Network(js_message(&e)))?;
        let signal = controller.signal();
        self.latest.replace(Some(controller));
        Self::execute(self.builder(Method::Get, url), Some(&signal)).await
    }

    fn abort_latest(&self) {
        if let Some(controller) = self.latest.take() {
            controller.abort();
        }
    }
}
