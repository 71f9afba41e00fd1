use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{classify_status, DavError, WagonError};
use crate::models::{Depth, MkColOutcome};
use crate::webdav_xml_parser::MultiStatus;

use super::config::WebDAVConfig;
use super::connection::{DavMethod, DavRequest, DavTransport, WebDAVConnection};
use super::directory_sync::DirectorySynchronizer;
use super::mkcol::MkColMethod;
use super::propfind::PropFindMethod;
use super::url_management::{filename, normalize_resource_name, WebDAVUrlManager};

/// Headers that keep intermediaries from answering a GET out of a cache
const NO_CACHE_HEADERS: [(&str, &str); 4] = [
    ("Cache-control", "no-cache"),
    ("Cache-store", "no-store"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Transfer session against one WebDAV repository
pub struct WebDAVWagon<T: DavTransport = WebDAVConnection> {
    transport: T,
    config: WebDAVConfig,
    urls: WebDAVUrlManager,
}

impl WebDAVWagon<WebDAVConnection> {
    /// Creates a session backed by a reqwest connection
    pub fn new(config: WebDAVConfig) -> Result<Self, WagonError> {
        let connection = WebDAVConnection::new(config.clone())?;
        Self::with_transport(config, connection)
    }
}

impl<T: DavTransport> WebDAVWagon<T> {
    /// Creates a session over an arbitrary transport
    pub fn with_transport(config: WebDAVConfig, transport: T) -> Result<Self, WagonError> {
        config.validate()?;
        let urls = WebDAVUrlManager::new(&config);
        Ok(Self {
            transport,
            config,
            urls,
        })
    }

    pub fn config(&self) -> &WebDAVConfig {
        &self.config
    }

    pub fn url_manager(&self) -> &WebDAVUrlManager {
        &self.urls
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// PROPFIND with the given depth. `None` means the server answered without
    /// a DAV multistatus (any non-207 status, or a non-DAV body).
    pub async fn propfind(&self, url: &str, depth: Depth) -> Result<Option<MultiStatus>, DavError> {
        let result = PropFindMethod::new(url, depth).execute(&self.transport).await?;
        Ok(result.multistatus)
    }

    pub async fn mkcol(&self, url: &str) -> Result<MkColOutcome, DavError> {
        MkColMethod::new(url).execute(&self.transport).await
    }

    /// Creates one collection, failing if anything already exists there
    pub async fn create_collection(&self, path: &str) -> Result<(), WagonError> {
        let url = self.urls.relative_path_to_url(path);
        info!("📁 Creating collection {}", url);

        match self.mkcol(&url).await? {
            MkColOutcome::Created => Ok(()),
            MkColOutcome::AlreadyExists => Err(WagonError::AlreadyExists { url }),
            MkColOutcome::Conflict => Err(WagonError::transfer_failed(format!(
                "Failed to create WebDAV collection (directory): {}. Parent collection is missing (409 Conflict)",
                url
            ))),
            MkColOutcome::Failed { status, reason } => Err(classify_status(status, reason.as_deref(), &url)),
        }
    }

    /// Uploads a local file, creating the parent collections it needs
    pub async fn put(&self, source: &Path, resource_name: &str) -> Result<(), WagonError> {
        info!("⬆️ Uploading {} to {}", source.display(), resource_name);
        DirectorySynchronizer::new(&self.transport, &self.urls)
            .ensure_directory_and_put(source, resource_name)
            .await
    }

    /// Uploads every file below `source_dir` to `destination`, keeping the
    /// relative layout. Empty local directories are not created remotely.
    /// Returns the number of files uploaded.
    pub async fn put_directory(&self, source_dir: &Path, destination: &str) -> Result<usize, WagonError> {
        if !source_dir.is_dir() {
            return Err(WagonError::transfer_failed(format!(
                "Specified source directory does not exist or is not a directory: {}",
                source_dir.display()
            )));
        }

        let files = collect_files(source_dir.to_path_buf()).await?;
        let destination = normalize_resource_name(destination);
        info!("⬆️ Uploading {} files from {} to {}", files.len(), source_dir.display(), destination);

        let synchronizer = DirectorySynchronizer::new(&self.transport, &self.urls);
        for (path, relative) in &files {
            let target = if destination.is_empty() {
                relative.clone()
            } else {
                format!("{}/{}", destination, relative)
            };
            synchronizer.ensure_directory_and_put(path, &target).await?;
        }

        Ok(files.len())
    }

    /// Downloads a resource to `destination`
    pub async fn get(&self, resource_name: &str, destination: &Path) -> Result<(), WagonError> {
        self.fetch(resource_name, destination, None).await.map(|_| ())
    }

    /// Downloads a resource only if the server copy is newer than `timestamp`.
    /// Returns whether the destination was written.
    pub async fn get_if_newer(
        &self,
        resource_name: &str,
        destination: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, WagonError> {
        self.fetch(resource_name, destination, Some(timestamp)).await
    }

    async fn fetch(
        &self,
        resource_name: &str,
        destination: &Path,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<bool, WagonError> {
        let url = self.urls.relative_path_to_url(resource_name);
        info!("⬇️ Downloading {}", url);

        let mut request = DavRequest::new(DavMethod::Get, url.clone());
        for (name, value) in NO_CACHE_HEADERS {
            request = request.header(name, value);
        }
        if let Some(timestamp) = timestamp {
            request = request.header("If-Modified-Since", http_date(timestamp));
        }

        let response = self.transport.execute(request).await?;

        match response.status {
            200 => {}
            304 => {
                debug!("{} not modified", url);
                return Ok(false);
            }
            status => return Err(classify_status(status, response.reason.as_deref(), &url)),
        }

        if let Some(timestamp) = timestamp {
            if let Some(last_modified) = response.header("Last-Modified").and_then(parse_http_date) {
                if last_modified <= timestamp {
                    debug!("{} last modified {} is not newer than {}", url, last_modified, timestamp);
                    return Ok(false);
                }
            }
        }

        write_destination(destination, &response.body).await?;
        info!("✅ Downloaded {} ({} bytes)", url, response.body.len());
        Ok(true)
    }

    /// Names of the immediate members of a collection. Child collections
    /// carry a trailing `/`.
    pub async fn get_file_list(&self, directory: &str) -> Result<Vec<String>, WagonError> {
        let directory = normalize_resource_name(directory);
        let url = self.urls.collection_url(&directory);

        let result = PropFindMethod::new(url.clone(), Depth::One)
            .execute(&self.transport)
            .await?;

        let multistatus = match result.status {
            200 | 207 => match result.multistatus {
                Some(multistatus) => multistatus,
                None => {
                    warn!("No WebDAV metadata returned for {}, listing is empty", url);
                    return Ok(Vec::new());
                }
            },
            status => return Err(classify_status(status, result.reason.as_deref(), &url)),
        };

        let mut names = Vec::new();
        for resource in multistatus.resources() {
            let relative = self.urls.href_to_relative_path(&resource.href);
            if relative == directory {
                if !resource.is_collection {
                    return Err(WagonError::resource_does_not_exist(format!(
                        "Destination {} exists but is not a WebDAV collection (directory)",
                        url
                    )));
                }
                continue;
            }

            let name = filename(&relative);
            if name.is_empty() {
                continue;
            }
            if resource.is_collection {
                names.push(format!("{}/", name));
            } else {
                names.push(name);
            }
        }

        names.sort();
        debug!("Found {} entries in {}", names.len(), url);
        Ok(names)
    }

    pub async fn resource_exists(&self, resource_name: &str) -> Result<bool, WagonError> {
        let url = self.urls.relative_path_to_url(resource_name);
        let response = self
            .transport
            .execute(DavRequest::new(DavMethod::Head, url.clone()))
            .await?;

        match response.status {
            200 | 304 => Ok(true),
            404 => Ok(false),
            status => Err(classify_status(status, response.reason.as_deref(), &url)),
        }
    }

    /// Whether `path` exists on the server and is a collection
    pub async fn collection_exists(&self, path: &str) -> Result<bool, WagonError> {
        let path = normalize_resource_name(path);
        let url = self.urls.collection_url(&path);

        let result = PropFindMethod::new(url.clone(), Depth::Zero)
            .execute(&self.transport)
            .await?;

        match result.status {
            200 | 207 => Ok(result
                .target_resource(&self.urls.relative_path_to_href(&path))
                .map(|resource| resource.is_collection)
                .unwrap_or(false)),
            404 => Ok(false),
            status => Err(classify_status(status, result.reason.as_deref(), &url)),
        }
    }

    /// Checks the `DAV` header of an OPTIONS response for compliance class 1
    pub async fn is_webdav_capable_server(&self) -> Result<bool, WagonError> {
        let url = self.urls.collection_url("");
        let response = self
            .transport
            .execute(DavRequest::new(DavMethod::Options, url.clone()))
            .await?;

        if !response.is_success() {
            debug!("OPTIONS {} returned {}", url, response.status);
            return Ok(false);
        }

        let capable = response
            .header("DAV")
            .map(|classes| classes.split(',').any(|class| class.trim() == "1"))
            .unwrap_or(false);

        info!("🔍 Server at {} WebDAV capable: {}", url, capable);
        Ok(capable)
    }
}

/// Regular files below `root` with their `/`-separated relative paths, in
/// depth-first, name-sorted order
async fn collect_files(root: PathBuf) -> Result<Vec<(PathBuf, String)>, WagonError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<(PathBuf, String)>, WagonError> {
        let mut files = Vec::new();

        for entry_result in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry_result.map_err(|e| {
                WagonError::transfer_failed_with(format!("Unable to read {}", root.display()), e)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .map(|rel| {
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .map_err(|e| WagonError::transfer_failed_with("Unable to compute relative path", e))?;

            files.push((entry.into_path(), relative));
        }

        Ok(files)
    })
    .await
    .map_err(|e| WagonError::transfer_failed_with("Directory walk was interrupted", e))?
}

fn http_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|date| date.with_timezone(&Utc))
        .ok()
}

async fn write_destination(destination: &Path, content: &[u8]) -> Result<(), WagonError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WagonError::transfer_failed_with(
                    format!("Unable to create directory {}", parent.display()),
                    e,
                )
            })?;
        }
    }

    if let Err(e) = tokio::fs::write(destination, content).await {
        // Do not leave a truncated artifact behind
        let _ = tokio::fs::remove_file(destination).await;
        return Err(WagonError::transfer_failed_with(
            format!("Unable to write {}", destination.display()),
            e,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{multistatus_body, ScriptedTransport};
    use crate::services::webdav::connection::DavResponse;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    const REPO: &str = "http://repo.example.com/repo";

    fn wagon() -> WebDAVWagon<ScriptedTransport> {
        WebDAVWagon::with_transport(WebDAVConfig::new(REPO.to_string()), ScriptedTransport::new())
            .expect("valid config")
    }

    fn url(path: &str) -> String {
        format!("{}/{}", REPO, path)
    }

    #[tokio::test]
    async fn test_file_list_excludes_directory_and_marks_collections() {
        let wagon = wagon();
        wagon.transport().respond_body(
            DavMethod::PropFind,
            &url("org/"),
            207,
            &multistatus_body(&[
                ("/repo/org/", true),
                ("/repo/org/a.jar", false),
                ("/repo/org/b.pom", false),
                ("/repo/org/c%20d.txt", false),
                ("/repo/org/sub1/", true),
                ("/repo/org/sub2/", true),
            ]),
        );

        let names = wagon.get_file_list("org").await.expect("listing");
        assert_eq!(names, vec!["a.jar", "b.pom", "c d.txt", "sub1/", "sub2/"]);
    }

    #[tokio::test]
    async fn test_file_list_of_missing_directory() {
        let wagon = wagon();
        let err = wagon.get_file_list("missing").await.expect_err("404 must fail");
        assert!(matches!(err, WagonError::ResourceDoesNotExist { .. }));
    }

    #[tokio::test]
    async fn test_file_list_of_file_is_rejected() {
        let wagon = wagon();
        wagon.transport().respond_body(
            DavMethod::PropFind,
            &url("a.jar/"),
            207,
            &multistatus_body(&[("/repo/a.jar", false)]),
        );

        let err = wagon.get_file_list("a.jar").await.expect_err("file is not a collection");
        assert!(matches!(err, WagonError::ResourceDoesNotExist { .. }));
    }

    #[tokio::test]
    async fn test_get_if_newer_not_modified() {
        let wagon = wagon();
        wagon.transport().respond_status(DavMethod::Get, &url("a.jar"), 304);
        let dir = tempfile::tempdir().expect("tempdir");
        let destination = dir.path().join("a.jar");

        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let written = wagon
            .get_if_newer("a.jar", &destination, timestamp)
            .await
            .expect("304 is not an error");

        assert!(!written);
        assert!(!destination.exists());

        let request = wagon.transport().requests().pop().expect("request");
        assert!(request.headers.contains(&(
            "If-Modified-Since".to_string(),
            "Mon, 01 Jan 2024 00:00:00 GMT".to_string()
        )));
        assert!(request
            .headers
            .contains(&("Pragma".to_string(), "no-cache".to_string())));
    }

    #[tokio::test]
    async fn test_get_if_newer_skips_older_server_copy() {
        let wagon = wagon();
        let mut response = DavResponse::new(200);
        response.body = b"old".to_vec();
        response.headers.insert(
            "Last-Modified",
            HeaderValue::from_static("Sun, 31 Dec 2023 12:00:00 GMT"),
        );
        wagon.transport().respond(DavMethod::Get, &url("a.jar"), response);

        let dir = tempfile::tempdir().expect("tempdir");
        let destination = dir.path().join("a.jar");
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let written = wagon
            .get_if_newer("a.jar", &destination, timestamp)
            .await
            .expect("get");
        assert!(!written);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_get_writes_destination_and_creates_parents() {
        let wagon = wagon();
        wagon
            .transport()
            .respond_body(DavMethod::Get, &url("org/a.jar"), 200, "jar bytes");

        let dir = tempfile::tempdir().expect("tempdir");
        let destination = dir.path().join("nested").join("a.jar");

        wagon.get("org/a.jar", &destination).await.expect("get");
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "jar bytes");
    }

    #[tokio::test]
    async fn test_get_missing_resource() {
        let wagon = wagon();
        let dir = tempfile::tempdir().expect("tempdir");

        let err = wagon
            .get("missing.jar", &dir.path().join("missing.jar"))
            .await
            .expect_err("404 must fail");
        assert!(matches!(err, WagonError::ResourceDoesNotExist { .. }));
    }

    #[tokio::test]
    async fn test_resource_exists() {
        let wagon = wagon();
        wagon.transport().respond_status(DavMethod::Head, &url("a.jar"), 200);
        wagon.transport().respond_status(DavMethod::Head, &url("secret.jar"), 403);

        assert!(wagon.resource_exists("a.jar").await.unwrap());
        assert!(!wagon.resource_exists("b.jar").await.unwrap());
        assert!(matches!(
            wagon.resource_exists("secret.jar").await,
            Err(WagonError::AuthorizationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_collection_exists() {
        let wagon = wagon();
        wagon.transport().respond_body(
            DavMethod::PropFind,
            &url("org/"),
            207,
            &multistatus_body(&[("/repo/org/", true)]),
        );
        wagon.transport().respond_body(
            DavMethod::PropFind,
            &url("a.jar/"),
            207,
            &multistatus_body(&[("/repo/a.jar", false)]),
        );

        assert!(wagon.collection_exists("org").await.unwrap());
        assert!(!wagon.collection_exists("a.jar").await.unwrap());
        assert!(!wagon.collection_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_collection_is_strict() {
        let wagon = wagon();
        wagon.transport().respond_status(DavMethod::MkCol, &url("new"), 201);
        wagon.transport().respond_status(DavMethod::MkCol, &url("old"), 405);
        wagon.transport().respond_status(DavMethod::MkCol, &url("x/y"), 409);

        assert!(wagon.create_collection("new").await.is_ok());
        assert!(matches!(
            wagon.create_collection("old").await,
            Err(WagonError::AlreadyExists { .. })
        ));
        let err = wagon.create_collection("x/y").await.expect_err("409 must fail");
        assert!(err.to_string().contains(&url("x/y")));
    }

    #[tokio::test]
    async fn test_webdav_capability_from_options() {
        let dav = wagon();
        let mut response = DavResponse::new(200);
        response.headers.insert("DAV", HeaderValue::from_static("1, 2"));
        dav.transport().respond(DavMethod::Options, &format!("{}/", REPO), response);
        assert!(dav.is_webdav_capable_server().await.unwrap());

        let plain = wagon();
        plain
            .transport()
            .respond_status(DavMethod::Options, &format!("{}/", REPO), 200);
        assert!(!plain.is_webdav_capable_server().await.unwrap());
    }

    #[tokio::test]
    async fn test_put_directory_creates_nested_collections_in_order() {
        let source = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(source.path().join("a").join("b")).unwrap();
        std::fs::create_dir_all(source.path().join("empty")).unwrap();
        std::fs::write(source.path().join("a").join("b").join("y.txt"), b"y").unwrap();
        std::fs::write(source.path().join("a").join("x.txt"), b"x").unwrap();
        std::fs::write(source.path().join("top.txt"), b"top").unwrap();

        let wagon = wagon();
        let transport = wagon.transport();
        transport.respond_status(DavMethod::PropFind, &url("site/a/b/"), 404);
        transport.respond_body(
            DavMethod::PropFind,
            &url("site/a/"),
            207,
            &multistatus_body(&[("/repo/site/a/", true)]),
        );
        transport.respond_body(
            DavMethod::PropFind,
            &url("site/"),
            207,
            &multistatus_body(&[("/repo/site/", true)]),
        );
        for dir in ["site", "site/a", "site/a/b"] {
            transport.respond_status(DavMethod::MkCol, &url(dir), 201);
        }
        for file in ["site/a/b/y.txt", "site/a/x.txt", "site/top.txt"] {
            transport.respond_status(DavMethod::Put, &url(file), 201);
        }

        let uploaded = wagon
            .put_directory(source.path(), "site")
            .await
            .expect("directory upload");

        assert_eq!(uploaded, 3);
        assert_eq!(
            transport.calls_with(DavMethod::MkCol),
            vec![url("site"), url("site/a"), url("site/a/b")]
        );
        assert_eq!(
            transport.calls_with(DavMethod::Put),
            vec![url("site/a/b/y.txt"), url("site/a/x.txt"), url("site/top.txt")]
        );
        assert!(transport.calls().iter().all(|(_, u)| !u.contains("empty")));
    }

    #[tokio::test]
    async fn test_put_directory_rejects_missing_source() {
        let wagon = wagon();
        let err = wagon
            .put_directory(Path::new("/nonexistent/site"), "site")
            .await
            .expect_err("missing source directory");

        assert!(matches!(err, WagonError::TransferFailed { .. }));
        assert!(wagon.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_propfind_returns_none_for_not_found() {
        let wagon = wagon();
        let multistatus = wagon
            .propfind(&url("missing/"), Depth::Zero)
            .await
            .expect("404 is not an error here");
        assert!(multistatus.is_none());
    }
}
