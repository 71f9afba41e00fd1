use thiserror::Error;

/// Failures raised by the HTTP method-execution primitive itself, before any
/// status code is available.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to '{url}' timed out")]
    Timeout { url: String },

    #[error("Request to '{url}' failed: {details}")]
    Connection { url: String, details: String },

    #[error("Invalid request for '{url}': {details}")]
    InvalidRequest { url: String, details: String },
}

/// Errors produced by a single WebDAV round trip (PROPFIND / MKCOL).
///
/// A response that is well-formed XML but not a DAV multistatus is NOT an
/// error; it shows up as a missing multistatus on the result instead.
#[derive(Error, Debug)]
pub enum DavError {
    #[error("Unable to parse multistatus from '{url}': {details}")]
    MalformedXml { url: String, details: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Caller-facing error taxonomy of a transfer session.
#[derive(Error, Debug)]
pub enum WagonError {
    #[error("Resource does not exist: {message}")]
    ResourceDoesNotExist { message: String },

    #[error("Authorization failed: {message}")]
    AuthorizationFailed { message: String },

    #[error("Collection already exists: {url}")]
    AlreadyExists { url: String },

    #[error("Transfer failed: {message}")]
    TransferFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid repository configuration: {details}")]
    ConfigurationInvalid { details: String },
}

impl WagonError {
    pub fn transfer_failed(message: impl Into<String>) -> Self {
        WagonError::TransferFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn transfer_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WagonError::TransferFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn resource_does_not_exist(message: impl Into<String>) -> Self {
        WagonError::ResourceDoesNotExist {
            message: message.into(),
        }
    }

    pub fn authorization_failed(message: impl Into<String>) -> Self {
        WagonError::AuthorizationFailed {
            message: message.into(),
        }
    }

    /// Stable error code for scripts and log processing
    pub fn error_code(&self) -> &'static str {
        match self {
            WagonError::ResourceDoesNotExist { .. } => "RESOURCE_DOES_NOT_EXIST",
            WagonError::AuthorizationFailed { .. } => "AUTHORIZATION_FAILED",
            WagonError::AlreadyExists { .. } => "ALREADY_EXISTS",
            WagonError::TransferFailed { .. } => "TRANSFER_FAILED",
            WagonError::ConfigurationInvalid { .. } => "CONFIGURATION_INVALID",
        }
    }

    /// Get optional suggested action for the user
    pub fn suggested_action(&self) -> Option<String> {
        match self {
            WagonError::AuthorizationFailed { .. } => {
                Some("Check the repository credentials and the server's access rules".to_string())
            }
            WagonError::ConfigurationInvalid { .. } => {
                Some("Fix the repository URL or credentials and try again".to_string())
            }
            WagonError::AlreadyExists { .. } => {
                Some("Remove the existing collection or choose another path".to_string())
            }
            _ => None,
        }
    }
}

impl From<DavError> for WagonError {
    fn from(err: DavError) -> Self {
        match err {
            DavError::MalformedXml { ref url, .. } => {
                let message = format!("Could not read response body from '{}'", url);
                WagonError::transfer_failed_with(message, err)
            }
            DavError::Transport(inner) => WagonError::from(inner),
        }
    }
}

impl From<TransportError> for WagonError {
    fn from(err: TransportError) -> Self {
        let message = err.to_string();
        WagonError::transfer_failed_with(message, err)
    }
}

/// Turns a non-success HTTP status into the error taxonomy.
///
/// This is the only place raw status codes are interpreted for GET, HEAD,
/// PROPFIND and MKCOL failures; PUT has its own table in the directory
/// synchronizer.
pub fn classify_status(status: u16, reason: Option<&str>, url: &str) -> WagonError {
    match status {
        401 => WagonError::authorization_failed(format!("Not authorized: {}", url)),
        403 => WagonError::authorization_failed(format!("Access denied to: {}", url)),
        407 => WagonError::authorization_failed(format!("Not authorized by proxy: {}", url)),
        404 => WagonError::resource_does_not_exist(format!("File: {} does not exist", url)),
        _ => WagonError::transfer_failed(format!(
            "Failed to transfer file: {}. Return code is: {}",
            url,
            describe_status(status, reason)
        )),
    }
}

/// Renders "409 Conflict" style text, falling back to the bare code.
pub fn describe_status(status: u16, reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!("{} {}", status, reason),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_authorization_codes() {
        for status in [401, 403, 407] {
            let err = classify_status(status, None, "http://repo/a.jar");
            assert!(matches!(err, WagonError::AuthorizationFailed { .. }), "status {}", status);
            assert_eq!(err.error_code(), "AUTHORIZATION_FAILED");
        }
    }

    #[test]
    fn test_classify_not_found_names_url() {
        let err = classify_status(404, Some("Not Found"), "http://repo/missing.pom");
        assert!(matches!(err, WagonError::ResourceDoesNotExist { .. }));
        assert!(err.to_string().contains("http://repo/missing.pom"));
    }

    #[test]
    fn test_classify_other_codes_include_status_and_reason() {
        let err = classify_status(500, Some("Internal Server Error"), "http://repo/x");
        let text = err.to_string();
        assert!(matches!(err, WagonError::TransferFailed { .. }));
        assert!(text.contains("500 Internal Server Error"));
        assert!(text.contains("http://repo/x"));
    }

    #[test]
    fn test_timeout_becomes_transfer_failure() {
        let err: WagonError = TransportError::Timeout {
            url: "http://repo/slow".to_string(),
        }
        .into();
        assert!(matches!(err, WagonError::TransferFailed { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_malformed_xml_is_transfer_failure_with_source() {
        let err: WagonError = DavError::MalformedXml {
            url: "http://repo/dir/".to_string(),
            details: "unexpected end".to_string(),
        }
        .into();
        match err {
            WagonError::TransferFailed { source, .. } => assert!(source.is_some()),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
