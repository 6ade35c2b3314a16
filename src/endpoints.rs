use std::time::Duration;

use crate::api::{EndpointDocument, TransferApi};
use crate::error::EndpointInfoError;

/// State of an endpoint at the moment it was fetched.
///
/// Activation changes outside this process (browser activation, async
/// auto-activation), so a snapshot is never updated: fetch a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSnapshot {
    pub id: String,
    pub display_name: String,
    pub is_active: bool,
    /// `None` when the activation never expires.
    pub expires_in: Option<Duration>,
}

impl From<EndpointDocument> for EndpointSnapshot {
    fn from(doc: EndpointDocument) -> Self {
        let display_name = doc
            .display_name
            .or(doc.canonical_name)
            .unwrap_or_else(|| doc.id.clone());
        EndpointSnapshot {
            expires_in: u64::try_from(doc.expires_in).ok().map(Duration::from_secs),
            is_active: doc.activated,
            display_name,
            id: doc.id,
        }
    }
}

/// Fetches endpoint snapshots. No retries and no caching.
pub struct EndpointInfoProvider<'a> {
    api: &'a dyn TransferApi,
}

impl<'a> EndpointInfoProvider<'a> {
    pub fn new(api: &'a dyn TransferApi) -> Self {
        Self { api }
    }

    pub fn fetch(&self, endpoint_id: &str) -> Result<EndpointSnapshot, EndpointInfoError> {
        match self.api.get_endpoint(endpoint_id) {
            Ok(doc) => Ok(doc.into()),
            Err(source) => {
                tracing::error!("Could not get endpoint info for {endpoint_id}: {source}");
                Err(EndpointInfoError {
                    endpoint: endpoint_id.to_string(),
                    source,
                })
            }
        }
    }
}
