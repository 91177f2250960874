//! Request execution on top of `reqwest::Client`, with session cookie
//! propagation and request/response exchange capture for the event channel.

use cookie::Cookie;
use reqwest::{
    header::{HeaderMap, COOKIE, SET_COOKIE},
    Method, StatusCode,
};
use tracing::*;

use crate::{case::RequestSpec, session::SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HttpError: {0}")]
    Http(#[from] reqwest::Error),
}

/// Captured response of one executed request.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
}

impl Response {
    /// Status line in the `"200 OK"` form.
    pub fn status_line(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogRequest {
    pub method: Method,
    pub url: String,
    /// Headers as actually sent, session cookies included.
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct LogResponse {
    pub status_line: String,
    pub headers: HeaderMap,
    pub body: String,
    /// Cookies newly observed on this response, rendered `name=value`.
    pub cookies: Vec<String>,
}

/// One request/response exchange, published to the event channel when
/// logging is enabled.
#[derive(Debug, Clone)]
pub struct Log {
    pub request: LogRequest,
    pub response: LogResponse,
}

/// Issues one HTTP call per [`RequestSpec`].
///
/// The executor is the only component that mutates the [`SessionStore`]: it
/// attaches the current cookie snapshot to the outgoing request and merges
/// every cookie observed on the response back in, last-response-wins.
#[derive(Clone, Default)]
pub struct Executor {
    client: reqwest::Client,
}

impl Executor {
    pub fn new() -> Executor {
        Executor::default()
    }

    /// Execute one request and read the full response body.
    ///
    /// Any failure to build the request, send it, or read the body is a
    /// transport error; the caller reports it as a single failing check and
    /// abandons the case.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        session: &SessionStore,
    ) -> Result<(Response, Box<Log>), Error> {
        let mut builder = self.client.request(spec.method.clone(), &spec.url);

        if let Some(cookies) = session.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !spec.body.is_empty() {
            builder = builder.body(spec.body.clone());
        }

        let request = builder.build()?;
        let log_request = LogRequest {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
        };

        debug!("sending {} {}", log_request.method, log_request.url);

        let res = self.client.execute(request).await?;
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await?;

        debug!("received {} ({} bytes)", status, body.len());

        let cookies = merge_cookies(&headers, session);

        let response = Response {
            status,
            headers,
            body,
        };
        let log = Box::new(Log {
            response: LogResponse {
                status_line: response.status_line(),
                headers: response.headers.clone(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
                cookies,
            },
            request: log_request,
        });

        Ok((response, log))
    }
}

/// Merge every `Set-Cookie` on the response into the session store.
/// Unparseable cookies are skipped, never fatal.
fn merge_cookies(headers: &HeaderMap, session: &SessionStore) -> Vec<String> {
    let mut observed = Vec::new();
    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else {
            warn!("ignoring non-UTF-8 set-cookie header");
            continue;
        };
        match Cookie::parse(raw.to_string()) {
            Ok(cookie) => {
                debug!("received cookie {}={}", cookie.name(), cookie.value());
                observed.push(format!("{}={}", cookie.name(), cookie.value()));
                session.put(cookie);
            }
            Err(e) => warn!("ignoring unparseable cookie {raw:?}: {e}"),
        }
    }
    observed
}
