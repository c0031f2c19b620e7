//! Framework-neutral response produced by route handlers and the file cache.
//!
//! The core never touches axum types directly; the server layer converts a
//! [`ServedResponse`] into whatever the host framework expects and must write
//! it out verbatim, appending nothing after the body.

pub const CONTENT_TYPE: &str = "Content-Type";
pub const JAVASCRIPT: &str = "application/javascript";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ServedResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub fn not_modified() -> Self {
        Self {
            status: 304,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
