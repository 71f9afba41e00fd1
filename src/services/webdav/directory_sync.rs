use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::{classify_status, describe_status, WagonError};
use crate::models::{Depth, MkColOutcome};
use super::connection::{DavMethod, DavRequest, DavTransport};
use super::mkcol::MkColMethod;
use super::propfind::PropFindMethod;
use super::url_management::{ancestor_chain, dirname, normalize_resource_name, WebDAVUrlManager};

/// Makes a flat `put` work against a tree of WebDAV collections.
///
/// The parent directory of the target is probed with a depth-0 PROPFIND. When
/// the server says 404 every prefix of the directory is created with MKCOL,
/// shallowest first, before the file itself is uploaded.
pub struct DirectorySynchronizer<'a, T: DavTransport + ?Sized> {
    transport: &'a T,
    urls: &'a WebDAVUrlManager,
}

impl<'a, T: DavTransport + ?Sized> DirectorySynchronizer<'a, T> {
    pub fn new(transport: &'a T, urls: &'a WebDAVUrlManager) -> Self {
        Self { transport, urls }
    }

    /// Uploads `source` to `resource_name`, creating missing parent collections
    pub async fn ensure_directory_and_put(
        &self,
        source: &Path,
        resource_name: &str,
    ) -> Result<(), WagonError> {
        let resource_name = normalize_resource_name(resource_name);
        if resource_name.is_empty() {
            return Err(WagonError::transfer_failed("Resource name cannot be empty"));
        }

        let content = read_source(source).await?;

        let dir = dirname(&resource_name);
        self.ensure_directory(&dir).await?;

        self.put(&resource_name, content).await
    }

    /// Makes sure the collection `dir` exists, creating it and its ancestors
    /// if the server reports it missing. An empty `dir` is the repository
    /// root and is never probed.
    pub async fn ensure_directory(&self, dir: &str) -> Result<(), WagonError> {
        let dir = normalize_resource_name(dir);
        if dir.is_empty() {
            return Ok(());
        }

        let probe_url = self.urls.collection_url(&dir);
        let probe = PropFindMethod::new(probe_url.clone(), Depth::Zero)
            .execute(self.transport)
            .await?;

        match probe.status {
            200 | 207 => {
                let target_href = self.urls.relative_path_to_href(&dir);
                match probe.target_resource(&target_href) {
                    Some(entry) if !entry.is_collection => Err(WagonError::transfer_failed(format!(
                        "Destination path exists and is not a WebDAV collection (directory): {}",
                        probe_url
                    ))),
                    Some(_) => {
                        debug!("📁 Collection {} already exists", dir);
                        Ok(())
                    }
                    None => {
                        // Existence is decided by the status code alone
                        debug!("📁 Collection {} exists, server returned no usable metadata", dir);
                        Ok(())
                    }
                }
            }
            404 => self.create_chain(&dir).await,
            401 | 403 | 407 => Err(classify_status(probe.status, probe.reason.as_deref(), &probe_url)),
            status => Err(WagonError::transfer_failed(format!(
                "Failed to create destination WebDAV collection (directory): {}. Return code is: {}",
                probe_url,
                describe_status(status, probe.reason.as_deref())
            ))),
        }
    }

    async fn create_chain(&self, dir: &str) -> Result<(), WagonError> {
        info!("📁 Creating collection chain for {}", dir);

        for segment in ancestor_chain(dir) {
            let url = self.urls.relative_path_to_url(&segment);
            match MkColMethod::new(url.clone()).execute(self.transport).await? {
                MkColOutcome::Created => debug!("✅ Created collection {}", url),
                MkColOutcome::AlreadyExists => debug!("Collection {} already exists", url),
                MkColOutcome::Conflict => {
                    return Err(WagonError::transfer_failed(format!(
                        "Failed to create destination WebDAV collection (directory): {}. Parent collection is missing (409 Conflict)",
                        url
                    )));
                }
                MkColOutcome::Failed { status, reason } => {
                    return Err(match status {
                        401 | 403 | 407 => classify_status(status, reason.as_deref(), &url),
                        _ => WagonError::transfer_failed(format!(
                            "Failed to create destination WebDAV collection (directory): {}. Return code is: {}",
                            url,
                            describe_status(status, reason.as_deref())
                        )),
                    });
                }
            }
        }

        Ok(())
    }

    async fn put(&self, resource_name: &str, content: Vec<u8>) -> Result<(), WagonError> {
        let url = self.urls.relative_path_to_url(resource_name);
        let size = content.len();

        let request = DavRequest::new(DavMethod::Put, url.clone())
            .header("Content-Type", "application/octet-stream")
            .body(content);

        let response = self.transport.execute(request).await?;
        let transport_success = response.is_success();

        interpret_put_status(response.status, response.reason.as_deref(), &url, transport_success)?;

        info!("⬆️ Uploaded {} ({} bytes)", url, size);
        Ok(())
    }
}

/// Status table for PUT. Codes outside the table are only tolerated when the
/// transport itself reported success.
pub fn interpret_put_status(
    status: u16,
    reason: Option<&str>,
    url: &str,
    transport_success: bool,
) -> Result<(), WagonError> {
    match status {
        200 | 201 => Ok(()),
        401 | 403 | 407 => Err(classify_status(status, reason, url)),
        404 => Err(WagonError::resource_does_not_exist(format!(
            "File: {} does not exist",
            url
        ))),
        411 => Err(WagonError::resource_does_not_exist(format!(
            "Transfer failed, server requires Content-Length: {}",
            url
        ))),
        _ if transport_success => {
            warn!("PUT {} returned {}, treating as success", url, describe_status(status, reason));
            Ok(())
        }
        _ => Err(classify_status(status, reason, url)),
    }
}

async fn read_source(source: &Path) -> Result<Vec<u8>, WagonError> {
    match tokio::fs::read(source).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(WagonError::transfer_failed(
            format!("Specified source file does not exist: {}", source.display()),
        )),
        Err(e) => Err(WagonError::transfer_failed_with(
            format!("Unable to read source file: {}", source.display()),
            e,
        )),
    }
}
