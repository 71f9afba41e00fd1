use serde::Serialize;

/// One resource reported inside a WebDAV multistatus response.
///
/// Optional properties stay `None` when the server did not send them; an
/// empty element is treated the same as a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DavResource {
    pub href: String,
    pub is_collection: bool,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub creation_date: Option<String>,
    pub last_modified: Option<String>,
    /// HTTP status from the propstat status line, 0 when missing or unparsable
    pub status: u16,
}

impl DavResource {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    pub fn set_as_collection(&mut self) {
        self.is_collection = true;
    }

    /// Parses the code out of an HTTP status line such as `HTTP/1.1 200 OK`.
    pub fn parse_status(&mut self, status_line: &str) {
        self.status = parse_status_line(status_line);
    }

    /// Last non-empty path segment of the href, still percent-encoded
    pub fn name(&self) -> &str {
        self.href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }
}

/// Returns the numeric code following the first whitespace-delimited token,
/// or 0 if there is none or it is not a number.
pub fn parse_status_line(status_line: &str) -> u16 {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .unwrap_or(0)
}
