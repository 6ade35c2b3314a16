//! Test doubles for the remote collaborators. They answer from preset state
//! and record every call so tests can assert on side effects.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use crate::activation::ManualActivationPrompt;
use crate::api::{
    AutoActivateResponse, CancelResponse, EndpointDocument, EndpointSummary, LsEntry, TaskHandle,
    TaskSummary, TransferApi, TransferData,
};
use crate::endpoints::EndpointSnapshot;
use crate::error::{ApiError, JobError};
use crate::jobs::{JobAd, Scheduler};

fn not_found(what: &str) -> ApiError {
    ApiError::Service {
        status: 404,
        code: "ClientError.NotFound".into(),
        message: format!("{what} not found"),
    }
}

#[derive(Default)]
struct MockEndpoint {
    active: bool,
    fetches: usize,
    /// Reports active from this fetch on (1-based).
    active_from_fetch: Option<usize>,
}

/// Transfer service double.
#[derive(Default)]
pub struct MockTransfer {
    endpoints: RefCell<HashMap<String, MockEndpoint>>,
    /// requested id -> id the service answers with
    aliases: RefCell<HashMap<String, String>>,
    autoactivate_codes: RefCell<HashMap<String, String>>,
    autoactivate_failures: RefCell<Vec<String>>,
    wait_outcomes: RefCell<VecDeque<Result<bool, ApiError>>>,
    wait_calls: Cell<usize>,
    calls: RefCell<Vec<String>>,
    pub submitted: RefCell<Vec<TransferData>>,
    pub listings: RefCell<HashMap<String, Vec<LsEntry>>>,
    pub cancel_code: RefCell<Option<String>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&self, id: &str, active: bool) {
        self.endpoints.borrow_mut().insert(
            id.to_string(),
            MockEndpoint {
                active,
                ..MockEndpoint::default()
            },
        );
    }

    /// Make `get_endpoint(alias)` answer with the document of `canonical`,
    /// as the service does for legacy names.
    pub fn alias(&self, alias: &str, canonical: &str) {
        self.aliases
            .borrow_mut()
            .insert(alias.to_string(), canonical.to_string());
    }

    pub fn set_active(&self, id: &str, active: bool) {
        if let Some(ep) = self.endpoints.borrow_mut().get_mut(id) {
            ep.active = active;
        }
    }

    /// Simulate a user activating the endpoint in a browser: from the
    /// `fetch`-th `get_endpoint` call on, it reports active.
    pub fn activate_on_fetch(&self, id: &str, fetch: usize) {
        if let Some(ep) = self.endpoints.borrow_mut().get_mut(id) {
            ep.active_from_fetch = Some(fetch);
        }
    }

    pub fn set_autoactivate_code(&self, id: &str, code: &str) {
        self.autoactivate_codes
            .borrow_mut()
            .insert(id.to_string(), code.to_string());
    }

    /// Make `endpoint_autoactivate` fail with a transport error for `id`.
    pub fn fail_autoactivate(&self, id: &str) {
        self.autoactivate_failures.borrow_mut().push(id.to_string());
    }

    /// Queue the outcome of the next `task_wait` call. With nothing queued
    /// the task is reported as not finished.
    pub fn push_wait(&self, outcome: Result<bool, ApiError>) {
        self.wait_outcomes.borrow_mut().push_back(outcome);
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls.get()
    }

    pub fn get_endpoint_calls(&self, id: &str) -> usize {
        self.endpoints
            .borrow()
            .get(id)
            .map_or(0, |ep| ep.fetches)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn log(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl TransferApi for MockTransfer {
    fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointDocument, ApiError> {
        self.log(format!("get_endpoint:{endpoint_id}"));
        let id = self
            .aliases
            .borrow()
            .get(endpoint_id)
            .cloned()
            .unwrap_or_else(|| endpoint_id.to_string());
        let mut endpoints = self.endpoints.borrow_mut();
        let ep = endpoints.get_mut(&id).ok_or_else(|| not_found(endpoint_id))?;
        ep.fetches += 1;
        if ep.active_from_fetch.is_some_and(|n| ep.fetches >= n) {
            ep.active = true;
        }
        Ok(EndpointDocument {
            display_name: Some(format!("{id} display")),
            id,
            canonical_name: None,
            activated: ep.active,
            expires_in: if ep.active { 3600 } else { 0 },
        })
    }

    fn endpoint_autoactivate(&self, endpoint_id: &str) -> Result<AutoActivateResponse, ApiError> {
        self.log(format!("autoactivate:{endpoint_id}"));
        if self
            .autoactivate_failures
            .borrow()
            .iter()
            .any(|id| id == endpoint_id)
        {
            return Err(ApiError::Service {
                status: 502,
                code: "ExternalError".into(),
                message: "bad gateway".into(),
            });
        }
        let code = self
            .autoactivate_codes
            .borrow()
            .get(endpoint_id)
            .cloned()
            .unwrap_or_else(|| "AutoActivated.CachedCredential".to_string());
        if code != crate::constants::AUTO_ACTIVATION_FAILED {
            self.set_active(endpoint_id, true);
        }
        Ok(AutoActivateResponse {
            code,
            message: String::new(),
        })
    }

    fn operation_ls(&self, endpoint_id: &str, path: &str) -> Result<Vec<LsEntry>, ApiError> {
        self.log(format!("ls:{endpoint_id}:{path}"));
        Ok(self
            .listings
            .borrow()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    fn submit_transfer(&self, data: &TransferData) -> Result<TaskHandle, ApiError> {
        self.log(format!(
            "submit:{}:{}",
            data.source_endpoint, data.destination_endpoint
        ));
        let mut submitted = self.submitted.borrow_mut();
        submitted.push(data.clone());
        Ok(TaskHandle {
            task_id: format!("task-{}", submitted.len()),
        })
    }

    fn task_wait(
        &self,
        task_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, ApiError> {
        self.log(format!(
            "task_wait:{task_id}:{}:{}",
            timeout.as_secs(),
            poll_interval.as_secs()
        ));
        self.wait_calls.set(self.wait_calls.get() + 1);
        self.wait_outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(false))
    }

    fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, ApiError> {
        self.log(format!("cancel:{task_id}"));
        let code = self
            .cancel_code
            .borrow()
            .clone()
            .unwrap_or_else(|| crate::constants::TASK_CANCELED.to_string());
        Ok(CancelResponse {
            message: format!("{task_id}: {code}"),
            code,
        })
    }

    fn task_list(&self, _limit: usize) -> Result<Vec<TaskSummary>, ApiError> {
        self.log("task_list".into());
        Ok(Vec::new())
    }

    fn endpoint_search(
        &self,
        _filter: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<EndpointSummary>, ApiError> {
        self.log("endpoint_search".into());
        Ok(self
            .endpoints
            .borrow()
            .keys()
            .map(|id| EndpointSummary {
                id: id.clone(),
                display_name: None,
            })
            .collect())
    }
}

/// Scheduler double: serves preset job ads and records every mutation.
#[derive(Default)]
pub struct MockScheduler {
    pub jobs: RefCell<Vec<JobAd>>,
    pub queries: RefCell<Vec<String>>,
    /// (constraint, key, value)
    pub edits: RefCell<Vec<(String, String, String)>>,
    /// (key, value)
    pub chirp_writes: RefCell<Vec<(String, String)>>,
    pub releases: RefCell<Vec<String>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<JobAd>) -> Self {
        Self {
            jobs: RefCell::new(jobs),
            ..Self::default()
        }
    }
}

impl Scheduler for MockScheduler {
    fn query(&self, constraint: &str) -> Result<Vec<JobAd>, JobError> {
        self.queries.borrow_mut().push(constraint.to_string());
        Ok(self.jobs.borrow().clone())
    }

    fn edit(&self, constraint: &str, key: &str, value: &str) -> Result<(), JobError> {
        self.edits
            .borrow_mut()
            .push((constraint.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }

    fn chirp_set_job_attr(&self, key: &str, value: &str) -> Result<(), JobError> {
        self.chirp_writes
            .borrow_mut()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn release(&self, constraint: &str) -> Result<(), JobError> {
        self.releases.borrow_mut().push(constraint.to_string());
        Ok(())
    }
}

/// Prompt double: records the URLs it was shown and confirms immediately
/// unless an abort was queued.
#[derive(Default)]
pub struct ScriptedPrompter {
    urls: RefCell<Vec<String>>,
    aborts: Cell<usize>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next confirmation fails, as if the user interrupted it.
    pub fn push_abort(&self) {
        self.aborts.set(self.aborts.get() + 1);
    }

    pub fn shown_urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl ManualActivationPrompt for ScriptedPrompter {
    fn confirm_activation(&self, _endpoint: &EndpointSnapshot, url: &str) -> io::Result<()> {
        self.urls.borrow_mut().push(url.to_string());
        if self.aborts.get() > 0 {
            self.aborts.set(self.aborts.get() - 1);
            return Err(io::Error::new(io::ErrorKind::Interrupted, "aborted"));
        }
        Ok(())
    }
}
