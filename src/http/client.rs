use super::debug::{HttpDebugConfig, Redactor, clip};
use crate::trace::SessionTrace;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// JSON-over-HTTP client used by model providers. Every exchange can be
/// mirrored to stderr (`--verbose`) and to the session trace.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: LogSink,
    trace: Option<SessionTrace>,
}

#[derive(Clone)]
enum LogSink {
    Stderr,
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    pub status: u16,
    pub body: String,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    fn marker(self) -> char {
        match self {
            Self::Outgoing => '>',
            Self::Incoming => '<',
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: LogSink::Stderr,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// POSTs `payload` as JSON. Non-2xx statuses are returned, not raised;
    /// only transport failures are errors.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        payload: &T,
    ) -> Result<JsonResponse, reqwest::Error> {
        let mut builder = self.inner.post(url).json(payload);
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build()?;
        let body_json = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));
        self.record_request(&request, &body_json);

        let response = self
            .inner
            .execute(request)
            .await
            .inspect_err(|err| self.record_failure(err))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .inspect_err(|err| self.record_failure(err))?;
        self.record_response(status, &headers, &body);

        Ok(JsonResponse { status, body })
    }

    fn record_request(&self, request: &Request, body_json: &str) {
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                &Redactor::ALWAYS.url(request.url()),
                request.headers(),
                body_json,
            );
        }
        if self.debug.enabled {
            let url = self.debug.redactor().url(request.url());
            let head = format!("{} {url}", request.method());
            self.emit(exchange_lines(
                self.debug,
                Direction::Outgoing,
                &head,
                request.headers(),
                body_json,
            ));
        }
    }

    fn record_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, headers, body);
        }
        if self.debug.enabled {
            self.emit(exchange_lines(
                self.debug,
                Direction::Incoming,
                &format!("HTTP {status}"),
                headers,
                body,
            ));
        }
    }

    fn record_failure(&self, err: &reqwest::Error) {
        if let Some(trace) = &self.trace {
            trace.log_http_error(&err.to_string());
        }
        if self.debug.enabled {
            self.emit(vec![format!("[http-debug] ! {err}")]);
        }
    }

    fn emit(&self, lines: Vec<String>) {
        match &self.sink {
            LogSink::Stderr => {
                let mut stderr = io::stderr().lock();
                for line in lines {
                    let _ = writeln!(stderr, "{line}");
                }
            }
            #[cfg(test)]
            LogSink::Buffer(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend(lines);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn with_buffer_sink(
        inner: Client,
        debug: HttpDebugConfig,
    ) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut client = Self::new(inner, debug);
        client.sink = LogSink::Buffer(Arc::clone(&buffer));
        (client, buffer)
    }
}

/// Debug rendering of one side of an exchange: the head line, headers, a
/// blank separator, then the (redacted, truncated) body line by line.
fn exchange_lines(
    debug: HttpDebugConfig,
    direction: Direction,
    head: &str,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let marker = direction.marker();
    let redactor = debug.redactor();
    let mut lines = vec![format!("[http-debug] {marker} {head}")];
    lines.extend(headers.iter().map(|(name, value)| {
        format!(
            "[http-debug] {marker} {}: {}",
            name.as_str(),
            redactor.header(name.as_str(), value)
        )
    }));
    lines.push(format!("[http-debug] {marker}"));

    let body = clip(&redactor.body(body), debug.max_body_chars);
    if body.is_empty() {
        lines.push(format!("[http-debug] {marker} <empty body>"));
    } else {
        lines.extend(body.lines().map(|line| format!("[http-debug] {marker} {line}")));
    }
    lines
}
