// WebDAV transfer modules organized by functionality

pub mod config;
pub mod connection;
pub mod directory_sync;
pub mod mkcol;
pub mod propfind;
pub mod service;
pub mod url_management;

// Re-export main types for convenience
pub use config::WebDAVConfig;
pub use connection::{DavMethod, DavRequest, DavResponse, DavTransport, WebDAVConnection};
pub use directory_sync::DirectorySynchronizer;
pub use mkcol::MkColMethod;
pub use propfind::{PropFindMethod, PropFindResult};
pub use service::WebDAVWagon;
pub use url_management::WebDAVUrlManager;
