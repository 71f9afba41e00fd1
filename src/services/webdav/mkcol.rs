use tracing::debug;

use crate::errors::DavError;
use crate::models::MkColOutcome;
use super::connection::{DavMethod, DavRequest, DavTransport};

/// A single MKCOL round trip. MKCOL is not recursive: the parent collection
/// has to exist already.
#[derive(Debug, Clone)]
pub struct MkColMethod {
    url: String,
}

impl MkColMethod {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn execute<T>(&self, transport: &T) -> Result<MkColOutcome, DavError>
    where
        T: DavTransport + ?Sized,
    {
        let response = transport
            .execute(DavRequest::new(DavMethod::MkCol, self.url.clone()))
            .await?;

        let outcome = MkColOutcome::from_status(response.status, response.reason);
        debug!("MKCOL {} - {:?}", self.url, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTransport;

    const URL: &str = "http://repo.example.com/releases/org";

    async fn mkcol_with_status(status: u16) -> MkColOutcome {
        let transport = ScriptedTransport::new();
        transport.respond_status(DavMethod::MkCol, URL, status);
        MkColMethod::new(URL).execute(&transport).await.expect("mkcol")
    }

    #[tokio::test]
    async fn test_created() {
        assert_eq!(mkcol_with_status(201).await, MkColOutcome::Created);
    }

    #[tokio::test]
    async fn test_method_not_allowed_means_already_exists() {
        assert_eq!(mkcol_with_status(405).await, MkColOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_conflict_means_missing_parent() {
        assert_eq!(mkcol_with_status(409).await, MkColOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_other_codes_are_failures() {
        assert!(matches!(
            mkcol_with_status(403).await,
            MkColOutcome::Failed { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = ScriptedTransport::new();
        transport.time_out(DavMethod::MkCol, URL);
        assert!(MkColMethod::new(URL).execute(&transport).await.is_err());
    }
}
