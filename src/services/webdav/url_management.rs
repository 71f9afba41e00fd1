use super::config::WebDAVConfig;

/// Centralized URL and path management for repository operations
///
/// Resource names coming from callers are repository-relative
/// (`org/example/lib/1.0/lib-1.0.jar`); hrefs coming back from the server are
/// absolute paths that include the repository's base path. This type converts
/// between the two and builds request URLs.
#[derive(Debug, Clone)]
pub struct WebDAVUrlManager {
    base_url: String,
    base_path: String,
}

impl WebDAVUrlManager {
    pub fn new(config: &WebDAVConfig) -> Self {
        Self {
            base_url: config.webdav_url(),
            base_path: config.base_path(),
        }
    }

    /// Repository URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert a repository-relative path to a request URL
    ///
    /// Input:  "org/lib/1.0/lib 1.0.jar"
    /// Output: "https://repo.example.com/releases/org/lib/1.0/lib%201.0.jar"
    pub fn relative_path_to_url(&self, relative_path: &str) -> String {
        let clean_path = normalize_resource_name(relative_path);

        if clean_path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, encode_path(&clean_path))
        }
    }

    /// Same as `relative_path_to_url` but always ending with `/`, the form
    /// WebDAV servers expect for collections.
    pub fn collection_url(&self, relative_path: &str) -> String {
        format!("{}/", self.relative_path_to_url(relative_path))
    }

    /// Server-side path (as it appears in hrefs) for a repository-relative path
    pub fn relative_path_to_href(&self, relative_path: &str) -> String {
        let clean_path = normalize_resource_name(relative_path);
        if clean_path.is_empty() {
            format!("{}/", self.base_path)
        } else {
            format!("{}/{}", self.base_path, encode_path(&clean_path))
        }
    }

    /// Convert a full href from a multistatus response to a repository-relative path
    ///
    /// Input:  "/releases/org/lib/"
    /// Output: "org/lib"
    pub fn href_to_relative_path(&self, href: &str) -> String {
        let path = href_path(href);
        let decoded = decode(path);
        let base = decode(&self.base_path);
        let relative = match decoded.strip_prefix(base.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => decoded.as_str(),
        };
        normalize_resource_name(relative)
    }
}

/// Replaces backslashes, drops empty and `.` segments and resolves `..`.
pub fn normalize_resource_name(name: &str) -> String {
    let replaced = name.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in replaced.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Parent directory of a normalized resource name, empty for top-level names
pub fn dirname(resource_name: &str) -> String {
    let normalized = normalize_resource_name(resource_name);
    match normalized.rfind('/') {
        Some(idx) => normalized[..idx].to_string(),
        None => String::new(),
    }
}

/// Last segment of a normalized resource name
pub fn filename(resource_name: &str) -> String {
    let normalized = normalize_resource_name(resource_name);
    match normalized.rfind('/') {
        Some(idx) => normalized[idx + 1..].to_string(),
        None => normalized,
    }
}

/// Every successively deeper prefix of a directory path, shallowest first.
///
/// `a/b/c` yields `["a", "a/b", "a/b/c"]`.
pub fn ancestor_chain(dir: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();

    for segment in normalize_resource_name(dir).split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        chain.push(current.clone());
    }

    chain
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn decode(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Strips scheme and authority when a server sends absolute URLs as hrefs.
pub(crate) fn href_path(href: &str) -> &str {
    if let Some(rest) = href
        .strip_prefix("http://")
        .or_else(|| href.strip_prefix("https://"))
    {
        match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        }
    } else {
        href
    }
}
