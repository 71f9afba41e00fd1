use tracing::{debug, warn};

use crate::errors::DavError;
use crate::models::{DavResource, Depth};
use crate::webdav_xml_parser::MultiStatus;
use super::connection::{DavMethod, DavRequest, DavTransport};
use super::url_management::{decode, href_path};

/// Properties requested on every PROPFIND
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:getcontenttype/>
        <D:getetag/>
        <D:creationdate/>
        <D:getlastmodified/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

pub const MULTI_STATUS: u16 = 207;

/// A single PROPFIND round trip
#[derive(Debug, Clone)]
pub struct PropFindMethod {
    url: String,
    depth: Depth,
}

/// Status of a PROPFIND plus the multistatus it carried, if any
#[derive(Debug, Clone)]
pub struct PropFindResult {
    pub url: String,
    pub status: u16,
    pub reason: Option<String>,
    /// Only set for 207 responses whose body is a DAV multistatus
    pub multistatus: Option<MultiStatus>,
}

impl PropFindMethod {
    pub fn new(url: impl Into<String>, depth: Depth) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub async fn execute<T>(&self, transport: &T) -> Result<PropFindResult, DavError>
    where
        T: DavTransport + ?Sized,
    {
        let request = DavRequest::new(DavMethod::PropFind, self.url.clone())
            .header("Depth", self.depth.header_value())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY.as_bytes().to_vec());

        let response = transport.execute(request).await?;
        debug!("PROPFIND {} (depth {}) - Status code: {}", self.url, self.depth, response.status);

        let multistatus = if response.status == MULTI_STATUS {
            let parsed = MultiStatus::parse(&response.body).map_err(|e| DavError::MalformedXml {
                url: self.url.clone(),
                details: e.details,
            })?;
            if parsed.is_none() {
                warn!("PROPFIND {} returned 207 without a DAV multistatus body", self.url);
            }
            parsed
        } else {
            None
        };

        Ok(PropFindResult {
            url: self.url.clone(),
            status: response.status,
            reason: response.reason,
            multistatus,
        })
    }
}

impl PropFindResult {
    /// Whether the server reported the resource at all, judged on the status
    /// code alone
    pub fn exists(&self) -> bool {
        self.status == MULTI_STATUS || self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Entry describing the requested resource itself.
    ///
    /// Matches on the href path ignoring a trailing slash and percent-encoding
    /// differences; for a single-entry response that entry is returned.
    pub fn target_resource(&self, target_href: &str) -> Option<&DavResource> {
        let multistatus = self.multistatus.as_ref()?;
        let wanted = comparable_href(target_href);

        multistatus
            .resources()
            .find(|resource| comparable_href(&resource.href) == wanted)
            .or_else(|| {
                if multistatus.len() == 1 {
                    multistatus.resources().next()
                } else {
                    None
                }
            })
    }
}

fn comparable_href(href: &str) -> String {
    decode(href_path(href)).trim_end_matches('/').to_string()
}
