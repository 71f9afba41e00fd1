//! In-memory transport for exercising the WebDAV operations without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::services::webdav::connection::{DavMethod, DavRequest, DavResponse, DavTransport};

/// Replays queued responses per (method, url) and records every request.
///
/// A queue's last response is repeated once the queue is drained; requests
/// with nothing scripted get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<(DavMethod, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<DavRequest>>,
}

#[derive(Clone)]
enum Scripted {
    Response(DavResponse),
    Timeout,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: DavMethod, url: &str, response: DavResponse) -> &Self {
        self.push(method, url, Scripted::Response(response));
        self
    }

    pub fn respond_status(&self, method: DavMethod, url: &str, status: u16) -> &Self {
        self.respond(method, url, DavResponse::new(status))
    }

    pub fn respond_body(&self, method: DavMethod, url: &str, status: u16, body: &str) -> &Self {
        let mut response = DavResponse::new(status);
        response.body = body.as_bytes().to_vec();
        self.respond(method, url, response)
    }

    pub fn time_out(&self, method: DavMethod, url: &str) -> &Self {
        self.push(method, url, Scripted::Timeout);
        self
    }

    fn push(&self, method: DavMethod, url: &str, scripted: Scripted) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry((method, url.to_string()))
                .or_default()
                .push_back(scripted);
        }
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<DavRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// `(method, url)` of every request, in order
    pub fn calls(&self) -> Vec<(DavMethod, String)> {
        self.requests()
            .into_iter()
            .map(|r| (r.method, r.url))
            .collect()
    }

    pub fn calls_with(&self, method: DavMethod) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.url)
            .collect()
    }
}

#[async_trait]
impl DavTransport for ScriptedTransport {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, TransportError> {
        let key = (request.method, request.url.clone());
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = match self.responses.lock() {
            Ok(mut responses) => match responses.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            },
            Err(_) => None,
        };

        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Timeout) => Err(TransportError::Timeout { url: request.url }),
            None => Ok(DavResponse::new(404)),
        }
    }
}

/// Builds a multistatus body from `(href, is_collection)` pairs.
pub fn multistatus_body(entries: &[(&str, bool)]) -> String {
    let mut body = String::from(r#"<?xml version="1.0" encoding="utf-8"?><D:multistatus xmlns:D="DAV:">"#);
    for (href, is_collection) in entries {
        let resourcetype = if *is_collection {
            "<D:resourcetype><D:collection/></D:resourcetype>"
        } else {
            "<D:resourcetype/>"
        };
        body.push_str(&format!(
            "<D:response><D:href>{}</D:href><D:propstat><D:prop>{}</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>",
            href, resourcetype
        ));
    }
    body.push_str("</D:multistatus>");
    body
}
