//! Per-request context handed to route handlers and middleware.

use std::collections::HashMap;

use crate::Request;
use crate::http::headers::names;

/// Path parameters captured by the matched route, already percent-decoded.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }
}

/// A request together with whatever the router learned while matching it.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The absolute URL of the current request, query string included.
    ///
    /// Built from the `Host` header; without one only the origin-form target
    /// (`/path?query`) is returned.
    pub fn request_url(&self) -> String {
        let target = match self.request.query_string() {
            Some(query) => format!("{}?{query}", self.request.path()),
            None => self.request.path().to_owned(),
        };
        match self.request.headers().get(names::HOST) {
            Some(host) if !host.trim().is_empty() => format!("http://{}{target}", host.trim()),
            _ => target,
        }
    }
}
