pub mod dav_resource;

use serde::Serialize;

pub use dav_resource::DavResource;

/// Depth header values for PROPFIND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// The resource only
    Zero,
    /// The resource and its immediate members
    One,
    /// The resource and its whole subtree
    Infinity,
}

impl Depth {
    pub fn header_value(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header_value())
    }
}

impl std::str::FromStr for Depth {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" => Ok(Depth::Zero),
            "1" => Ok(Depth::One),
            "infinity" => Ok(Depth::Infinity),
            other => Err(format!("Invalid depth '{}'. Valid values are: 0, 1, infinity", other)),
        }
    }
}

/// Classified result of a single MKCOL request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MkColOutcome {
    /// 201: the collection now exists
    Created,
    /// 405: something is already mapped at that URL
    AlreadyExists,
    /// 409: an intermediate collection is missing
    Conflict,
    Failed { status: u16, reason: Option<String> },
}

impl MkColOutcome {
    pub fn from_status(status: u16, reason: Option<String>) -> Self {
        match status {
            201 => MkColOutcome::Created,
            405 => MkColOutcome::AlreadyExists,
            409 => MkColOutcome::Conflict,
            _ => MkColOutcome::Failed { status, reason },
        }
    }
}
