use std::collections::HashMap;
use std::io::Cursor;
use std::str;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::DavResource;

pub const DAV_NAMESPACE: &str = "DAV:";
const MULTISTATUS: &str = "multistatus";

/// The body could not be read as XML at all.
#[derive(Error, Debug)]
#[error("{details}")]
pub struct XmlParseError {
    pub details: String,
}

impl XmlParseError {
    fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
        }
    }
}

impl From<quick_xml::Error> for XmlParseError {
    fn from(e: quick_xml::Error) -> Self {
        XmlParseError::new(format!("XML parsing error: {}", e))
    }
}

impl From<quick_xml::escape::EscapeError> for XmlParseError {
    fn from(e: quick_xml::escape::EscapeError) -> Self {
        XmlParseError::new(format!("Invalid escape sequence: {}", e))
    }
}

impl From<std::io::Error> for XmlParseError {
    fn from(e: std::io::Error) -> Self {
        XmlParseError::new(format!("Unable to write XML: {}", e))
    }
}

#[derive(Debug)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Owned element with its name exactly as written in the document.
#[derive(Debug)]
struct XmlElement {
    qname: String,
    prefix: Option<String>,
    local_name: String,
    namespace: Option<String>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn child(&self, qname: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(e) if e.qname == qname => Some(e),
            _ => None,
        })
    }

    fn children_named<'a, 'q>(&'a self, qname: &'q str) -> impl Iterator<Item = &'a XmlElement> + 'q
    where
        'a: 'q,
    {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(e) if e.qname == qname => Some(e),
            _ => None,
        })
    }

    /// Concatenated direct text children; `None` when there is no text.
    fn text(&self) -> Option<String> {
        let text: String = self
            .children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn child_text(&self, qname: &str) -> Option<String> {
        self.child(qname).and_then(XmlElement::text)
    }
}

/// Builds DAV element names with whatever prefix the root element used.
struct DavNames {
    prefix: Option<String>,
}

impl DavNames {
    fn name(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }
}

/// Flat view of a WebDAV multistatus response, keyed by href.
///
/// Collections and files are filters over this map, not a tree. For a
/// depth-1 listing the requested directory itself is one of the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiStatus {
    resources: HashMap<String, DavResource>,
}

impl MultiStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a multistatus body.
    ///
    /// Returns `Ok(None)` when the document is well-formed but its root is not
    /// `DAV:multistatus` (a server error page, for instance); callers should
    /// read that as "no metadata" rather than as a failure.
    pub fn parse(body: &[u8]) -> Result<Option<MultiStatus>, XmlParseError> {
        let root = parse_document(body)?;

        if root.namespace.as_deref() != Some(DAV_NAMESPACE) {
            warn!(
                "Encountered invalid namespace <{}>, expected <{}>",
                root.namespace.as_deref().unwrap_or(""),
                DAV_NAMESPACE
            );
            return Ok(None);
        }

        if root.local_name != MULTISTATUS {
            warn!("Encountered unexpected <{}>, expected <{}>", root.local_name, MULTISTATUS);
            return Ok(None);
        }

        let names = DavNames {
            prefix: root.prefix.clone(),
        };

        let response_name = names.name("response");
        let href_name = names.name("href");
        let propstat_name = names.name("propstat");
        let prop_name = names.name("prop");
        let status_name = names.name("status");
        let resourcetype_name = names.name("resourcetype");
        let collection_name = names.name("collection");

        let mut multistatus = MultiStatus::new();

        for response in root.children_named(&response_name) {
            let href = match response.child_text(&href_name) {
                Some(href) => href.trim().to_string(),
                None => {
                    warn!("Skipping multistatus response without an href");
                    continue;
                }
            };

            let mut resource = DavResource::new(href);

            // First propstat that carries a prop; servers put 404 propstats
            // for unknown properties after the 200 one.
            let propstat = response
                .children_named(&propstat_name)
                .find(|propstat| propstat.child(&prop_name).is_some());

            if let Some(propstat) = propstat {
                if let Some(prop) = propstat.child(&prop_name) {
                    resource.content_type = prop.child_text(&names.name("getcontenttype"));
                    resource.etag = prop.child_text(&names.name("getetag"));
                    resource.creation_date = prop.child_text(&names.name("creationdate"));
                    resource.last_modified = prop.child_text(&names.name("getlastmodified"));

                    let is_collection = prop
                        .child(&resourcetype_name)
                        .and_then(|resourcetype| resourcetype.child(&collection_name))
                        .is_some();
                    if is_collection {
                        resource.set_as_collection();
                    }
                }

                if let Some(status) = propstat.child_text(&status_name) {
                    resource.parse_status(&status);
                }
            }

            multistatus.add_resource(resource);
        }

        debug!("Parsed multistatus with {} resources", multistatus.len());
        Ok(Some(multistatus))
    }

    /// Inserts a resource, replacing any previous entry with the same href.
    pub fn add_resource(&mut self, resource: DavResource) {
        self.resources.insert(resource.href.clone(), resource);
    }

    pub fn resource(&self, href: &str) -> Option<&DavResource> {
        self.resources.get(href)
    }

    pub fn resources(&self) -> impl Iterator<Item = &DavResource> {
        self.resources.values()
    }

    pub fn collection_resources(&self) -> Vec<&DavResource> {
        self.resources.values().filter(|r| r.is_collection).collect()
    }

    pub fn file_resources(&self) -> Vec<&DavResource> {
        self.resources.values().filter(|r| !r.is_collection).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Renders the entries back into a `D:`-prefixed multistatus document.
    pub fn to_xml(&self) -> Result<String, XmlParseError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut root = BytesStart::new("D:multistatus");
        root.push_attribute(("xmlns:D", DAV_NAMESPACE));
        writer.write_event(Event::Start(root))?;

        let mut hrefs: Vec<&String> = self.resources.keys().collect();
        hrefs.sort();

        for href in hrefs {
            let resource = &self.resources[href];
            writer.write_event(Event::Start(BytesStart::new("D:response")))?;
            write_text_element(&mut writer, "D:href", &resource.href)?;
            writer.write_event(Event::Start(BytesStart::new("D:propstat")))?;
            writer.write_event(Event::Start(BytesStart::new("D:prop")))?;

            let optional = [
                ("D:getcontenttype", &resource.content_type),
                ("D:getetag", &resource.etag),
                ("D:creationdate", &resource.creation_date),
                ("D:getlastmodified", &resource.last_modified),
            ];
            for (name, value) in optional {
                if let Some(value) = value {
                    write_text_element(&mut writer, name, value)?;
                }
            }

            if resource.is_collection {
                writer.write_event(Event::Start(BytesStart::new("D:resourcetype")))?;
                writer.write_event(Event::Empty(BytesStart::new("D:collection")))?;
                writer.write_event(Event::End(BytesEnd::new("D:resourcetype")))?;
            } else {
                writer.write_event(Event::Empty(BytesStart::new("D:resourcetype")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
            if resource.status != 0 {
                write_text_element(&mut writer, "D:status", &format!("HTTP/1.1 {}", resource.status))?;
            }
            writer.write_event(Event::End(BytesEnd::new("D:propstat")))?;
            writer.write_event(Event::End(BytesEnd::new("D:response")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("D:multistatus")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| XmlParseError::new(format!("Invalid UTF-8 in rendered document: {}", e)))
    }
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), XmlParseError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Reads the whole document into an element tree and returns its root.
fn parse_document(body: &[u8]) -> Result<XmlElement, XmlParseError> {
    let mut reader = NsReader::from_reader(body);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_resolved_event_into(&mut buf)? {
            (resolved, Event::Start(e)) => {
                if root.is_some() {
                    return Err(XmlParseError::new("Document has more than one root element"));
                }

                let namespace = match resolved {
                    ResolveResult::Bound(ns) => Some(
                        str::from_utf8(ns.as_ref())
                            .map_err(|e| XmlParseError::new(format!("Invalid UTF-8 in namespace: {}", e)))?
                            .to_string(),
                    ),
                    ResolveResult::Unbound => None,
                    ResolveResult::Unknown(prefix) => {
                        return Err(XmlParseError::new(format!(
                            "Unbound namespace prefix '{}'",
                            String::from_utf8_lossy(&prefix)
                        )));
                    }
                };

                stack.push(element_from_start(&e, namespace)?);
            }
            (_, Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlParseError::new("Unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            (_, Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape()?.into_owned();
                    current.children.push(XmlNode::Text(text));
                }
            }
            (_, Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = str::from_utf8(&e)
                        .map_err(|e| XmlParseError::new(format!("Invalid UTF-8 in CDATA: {}", e)))?
                        .to_string();
                    current.children.push(XmlNode::Text(text));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }

        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlParseError::new(format!(
            "Unexpected end of document inside <{}>",
            stack[stack.len() - 1].qname
        )));
    }

    root.ok_or_else(|| XmlParseError::new("Document has no root element"))
}

fn element_from_start(e: &BytesStart, namespace: Option<String>) -> Result<XmlElement, XmlParseError> {
    let qname = e.name();
    let to_string = |bytes: &[u8]| -> Result<String, XmlParseError> {
        str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| XmlParseError::new(format!("Invalid UTF-8 in element name: {}", e)))
    };

    let prefix = match qname.prefix() {
        Some(prefix) => Some(to_string(prefix.as_ref())?),
        None => None,
    };

    Ok(XmlElement {
        qname: to_string(qname.as_ref())?,
        prefix,
        local_name: to_string(qname.local_name().as_ref())?,
        namespace,
        children: Vec::new(),
    })
}
