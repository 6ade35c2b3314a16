//! Endpoint activation.
//!
//! Endpoints go through three stages, and every endpoint finishes a stage
//! before any endpoint enters the next one:
//!
//! 1. already active: a read, no side effects;
//! 2. auto-activation: one call per endpoint, no retry;
//! 3. manual activation: interactively, the user activates in a browser and
//!    confirms (repeated until the endpoint reports active); in a batch job,
//!    the endpoint is recorded on the job and left unresolved.

use std::collections::BTreeSet;
use std::io;

use reqwest::Url;

use crate::api::TransferApi;
use crate::constants;
use crate::endpoints::{EndpointInfoProvider, EndpointSnapshot};
use crate::error::{EndpointActivationError, Result};
use crate::jobs::BatchJobBridge;

/// Blocks until a human says they activated the endpoint.
pub trait ManualActivationPrompt {
    /// Show `url` and wait for confirmation. An error aborts activation.
    fn confirm_activation(&self, endpoint: &EndpointSnapshot, url: &str) -> io::Result<()>;
}

/// How stage 3 is handled.
pub enum RunMode<'a> {
    Interactive(&'a dyn ManualActivationPrompt),
    Batch(&'a BatchJobBridge<'a>),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationResult {
    pub activated: BTreeSet<String>,
    pub unresolved: BTreeSet<String>,
}

impl ActivationResult {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// File manager URL where the user can activate `endpoint_id`.
pub fn manual_activation_url(endpoint_id: &str) -> String {
    match Url::parse_with_params(constants::FILE_MANAGER_URL, &[("origin_id", endpoint_id)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}?origin_id={endpoint_id}", constants::FILE_MANAGER_URL),
    }
}

pub struct ActivationEngine<'a> {
    api: &'a dyn TransferApi,
    info: EndpointInfoProvider<'a>,
    mode: RunMode<'a>,
}

impl<'a> ActivationEngine<'a> {
    pub fn new(api: &'a dyn TransferApi, mode: RunMode<'a>) -> Self {
        Self {
            api,
            info: EndpointInfoProvider::new(api),
            mode,
        }
    }

    /// Make every endpoint in `endpoint_ids` active, in order.
    ///
    /// Interactively, anything left unresolved is an
    /// [`EndpointActivationError`]. In batch mode unresolved endpoints have
    /// been recorded on the job and come back in `unresolved`.
    pub fn activate_all(&self, endpoint_ids: &[String]) -> Result<ActivationResult> {
        let mut result = ActivationResult::default();

        // keyed by the caller's id; the service may spell it differently
        let mut inactive = Vec::new();
        for id in dedup(endpoint_ids) {
            let snapshot = self.info.fetch(id)?;
            if snapshot.is_active {
                tracing::debug!("Endpoint {id} is already active");
                result.activated.insert(id.to_string());
            } else {
                inactive.push((id, snapshot));
            }
        }

        let mut manual = Vec::new();
        for (id, snapshot) in inactive {
            if self.activate_automatically(id) {
                result.activated.insert(id.to_string());
            } else {
                manual.push((id, snapshot));
            }
        }

        match &self.mode {
            RunMode::Interactive(prompt) => {
                let mut aborted = false;
                for (id, snapshot) in manual {
                    if !aborted {
                        match self.activate_manually(*prompt, id, &snapshot) {
                            Ok(()) => {
                                result.activated.insert(id.to_string());
                                continue;
                            }
                            Err(e) => {
                                tracing::warn!("Manual activation of {id} aborted: {e}");
                                aborted = true;
                            }
                        }
                    }
                    result.unresolved.insert(id.to_string());
                }
                if !result.is_complete() {
                    let endpoints: Vec<String> = result.unresolved.iter().cloned().collect();
                    tracing::error!("Was not able to activate endpoint(s) {}", endpoints.join(", "));
                    return Err(EndpointActivationError { endpoints }.into());
                }
            }
            RunMode::Batch(bridge) => {
                for (id, _) in manual {
                    let ordinal = bridge.record_pending_manual_activation(id)?;
                    tracing::warn!(
                        "Endpoint {id} requires manual activation, recorded as #{ordinal} on the job"
                    );
                    result.unresolved.insert(id.to_string());
                }
            }
        }

        Ok(result)
    }

    /// Anything other than an explicit `AutoActivationFailed` counts as
    /// activated. Transport errors count as a failure.
    fn activate_automatically(&self, endpoint_id: &str) -> bool {
        match self.api.endpoint_autoactivate(endpoint_id) {
            Ok(response) if response.code == constants::AUTO_ACTIVATION_FAILED => {
                tracing::debug!("Auto-activation failed for endpoint {endpoint_id}");
                false
            }
            Ok(response) => {
                tracing::debug!("Auto-activated endpoint {endpoint_id} ({})", response.code);
                true
            }
            Err(e) => {
                tracing::warn!("Auto-activation request for endpoint {endpoint_id} failed: {e}");
                false
            }
        }
    }

    /// Prompt until a fresh snapshot says the endpoint is active.
    fn activate_manually(
        &self,
        prompt: &dyn ManualActivationPrompt,
        endpoint_id: &str,
        snapshot: &EndpointSnapshot,
    ) -> io::Result<()> {
        let url = manual_activation_url(endpoint_id);
        loop {
            prompt.confirm_activation(snapshot, &url)?;
            match self.info.fetch(endpoint_id) {
                Ok(fresh) if fresh.is_active => {
                    tracing::debug!("Endpoint {endpoint_id} was activated manually");
                    return Ok(());
                }
                Ok(_) => tracing::warn!("Endpoint {endpoint_id} is still not active"),
                Err(e) => tracing::warn!("{e}"),
            }
        }
    }
}

fn dedup(ids: &[String]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}
