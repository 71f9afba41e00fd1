pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod webdav_xml_parser;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use errors::{DavError, TransportError, WagonError};
pub use models::{DavResource, Depth, MkColOutcome};
pub use services::webdav::{WebDAVConfig, WebDAVWagon};
pub use webdav_xml_parser::MultiStatus;
