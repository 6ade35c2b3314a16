// Transfer service module: the `TransferApi` trait the rest of the crate
// talks to, and a small blocking client implementing it against the
// Globus Transfer REST API. Everything is synchronous; each method is one
// request (except `task_wait`, which polls).

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{self, Env};
use crate::constants;
use crate::error::ApiError;

/// Sync level sent with every transfer: compare checksums.
pub const SYNC_LEVEL_CHECKSUM: u8 = 3;

/// Raw endpoint document as returned by `GET endpoint/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EndpointDocument {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub activated: bool,
    /// Seconds until the activation expires; negative means it never does.
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AutoActivateResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    pub source_path: String,
    pub destination_path: String,
    pub recursive: bool,
}

/// Everything needed to submit one transfer task.
#[derive(Debug, Clone)]
pub struct TransferData {
    pub source_endpoint: String,
    pub destination_endpoint: String,
    pub label: Option<String>,
    pub sync_level: u8,
    pub items: Vec<TransferItem>,
}

/// Server-side identifier of a submitted task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskDocument {
    pub task_id: String,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CancelResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskSummary {
    pub task_id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub status: String,
    #[serde(default)]
    pub source_endpoint_id: Option<String>,
    #[serde(default)]
    pub source_endpoint_display_name: Option<String>,
    #[serde(default)]
    pub destination_endpoint_id: Option<String>,
    #[serde(default)]
    pub destination_endpoint_display_name: Option<String>,
    #[serde(default)]
    pub completion_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EndpointSummary {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
struct DataList<T> {
    #[serde(rename = "DATA")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// The remote operations the CLI needs from the transfer service.
///
/// Production code uses [`TransferClient`]; tests inject `mock::MockTransfer`.
pub trait TransferApi {
    fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointDocument, ApiError>;

    fn endpoint_autoactivate(&self, endpoint_id: &str) -> Result<AutoActivateResponse, ApiError>;

    fn operation_ls(&self, endpoint_id: &str, path: &str) -> Result<Vec<LsEntry>, ApiError>;

    fn submit_transfer(&self, data: &TransferData) -> Result<TaskHandle, ApiError>;

    /// Block until the task is neither `ACTIVE` nor `INACTIVE` (paused, for
    /// example on expired credentials) or `timeout` elapses,
    /// checking every `poll_interval`. Returns whether the task finished.
    fn task_wait(
        &self,
        task_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, ApiError>;

    fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, ApiError>;

    fn task_list(&self, limit: usize) -> Result<Vec<TaskSummary>, ApiError>;

    fn endpoint_search(
        &self,
        filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EndpointSummary>, ApiError>;
}

/// Blocking Transfer API client holding the base URL and the access token
/// used as a bearer credential on every request.
#[derive(Clone)]
pub struct TransferClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TransferClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        Ok(TransferClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Build a client for the base URL in `GLOBUS_TRANSFER_URL`, falling back
    /// to the production service.
    pub fn from_env(env: &dyn Env, token: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = config::service_url(
            env,
            constants::TRANSFER_URL_ENV,
            constants::TRANSFER_URL_DEFAULT,
        );
        Self::new(base_url, token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }

    fn get_task(&self, task_id: &str) -> Result<TaskDocument, ApiError> {
        let res = self.get(&format!("task/{task_id}")).send()?;
        decode(res)
    }

    fn submission_id(&self) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct SubmissionId {
            value: String,
        }
        let res = self.get("submission_id").send()?;
        Ok(decode::<SubmissionId>(res)?.value)
    }
}

/// Turn a non-success response into `ApiError::Service`, reading the
/// service's `{code, message}` body when it has one.
pub(crate) fn check(res: Response) -> Result<Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.code, body.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("Error").to_string(),
            text,
        ),
    };
    Err(ApiError::Service {
        status: status.as_u16(),
        code,
        message,
    })
}

/// A task is still running while `ACTIVE` or `INACTIVE`.
pub(crate) fn task_finished(status: &str) -> bool {
    !matches!(status, "ACTIVE" | "INACTIVE")
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let text = check(res)?.text()?;
    Ok(serde_json::from_str(&text)?)
}

impl TransferApi for TransferClient {
    fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointDocument, ApiError> {
        tracing::debug!("[transfer:get_endpoint] >>> {endpoint_id}");
        let res = self.get(&format!("endpoint/{endpoint_id}")).send()?;
        decode(res)
    }

    fn endpoint_autoactivate(&self, endpoint_id: &str) -> Result<AutoActivateResponse, ApiError> {
        tracing::debug!("[transfer:endpoint_autoactivate] >>> {endpoint_id}");
        let res = self
            .post(&format!("endpoint/{endpoint_id}/autoactivate"))
            .json(&json!({}))
            .send()?;
        let response: AutoActivateResponse = decode(res)?;
        tracing::debug!(
            "[transfer:endpoint_autoactivate] <<< {}: {}",
            response.code,
            response.message
        );
        Ok(response)
    }

    fn operation_ls(&self, endpoint_id: &str, path: &str) -> Result<Vec<LsEntry>, ApiError> {
        tracing::debug!("[transfer:operation_ls] >>> {endpoint_id}:{path}");
        let res = self
            .get(&format!("operation/endpoint/{endpoint_id}/ls"))
            .query(&[("path", path)])
            .send()?;
        Ok(decode::<DataList<LsEntry>>(res)?.data)
    }

    fn submit_transfer(&self, data: &TransferData) -> Result<TaskHandle, ApiError> {
        let submission_id = self.submission_id()?;
        let items: Vec<_> = data
            .items
            .iter()
            .map(|item| {
                json!({
                    "DATA_TYPE": "transfer_item",
                    "source_path": item.source_path,
                    "destination_path": item.destination_path,
                    "recursive": item.recursive,
                })
            })
            .collect();
        let body = json!({
            "DATA_TYPE": "transfer",
            "submission_id": submission_id,
            "source_endpoint": data.source_endpoint,
            "destination_endpoint": data.destination_endpoint,
            "label": data.label,
            "sync_level": data.sync_level,
            "DATA": items,
        });
        tracing::debug!(
            "[transfer:submit_transfer] >>> {} -> {} ({} item(s))",
            data.source_endpoint,
            data.destination_endpoint,
            data.items.len()
        );
        let res = self.post("transfer").json(&body).send()?;
        decode(res)
    }

    fn task_wait(
        &self,
        task_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, ApiError> {
        let start = Instant::now();
        loop {
            let task = self.get_task(task_id)?;
            tracing::debug!("[transfer:task_wait] task {task_id} is {}", task.status);
            if task_finished(&task.status) {
                return Ok(true);
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Ok(false);
            }
            thread::sleep(poll_interval.min(timeout - waited));
        }
    }

    fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, ApiError> {
        tracing::debug!("[transfer:cancel_task] >>> {task_id}");
        let res = self.post(&format!("task/{task_id}/cancel")).send()?;
        decode(res)
    }

    fn task_list(&self, limit: usize) -> Result<Vec<TaskSummary>, ApiError> {
        let res = self
            .get("task_list")
            .query(&[
                ("limit", limit.to_string()),
                ("filter", "type:TRANSFER,DELETE".to_string()),
            ])
            .send()?;
        Ok(decode::<DataList<TaskSummary>>(res)?.data)
    }

    fn endpoint_search(
        &self,
        filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EndpointSummary>, ApiError> {
        let mut query = vec![
            ("filter_scope", "my-endpoints".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(text) = filter {
            query.push(("filter_fulltext", text.to_string()));
        }
        let res = self.get("endpoint_search").query(&query).send()?;
        Ok(decode::<DataList<EndpointSummary>>(res)?.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_document_tolerates_missing_fields() {
        let doc: EndpointDocument =
            serde_json::from_str(r#"{"id": "abc", "display_name": null}"#).unwrap();
        assert_eq!(doc.id, "abc");
        assert!(!doc.activated);
        assert_eq!(doc.expires_in, 0);
    }

    #[test]
    fn ls_listing_reads_type_field() {
        let list: DataList<LsEntry> = serde_json::from_str(
            r#"{"DATA": [{"name": "data", "type": "dir", "size": 4096, "DATA_TYPE": "file"}]}"#,
        )
        .unwrap();
        assert_eq!(list.data[0].kind, "dir");
        assert_eq!(list.data[0].size, 4096);
    }

    #[test]
    fn paused_task_is_not_finished() {
        assert!(!task_finished("INACTIVE"));
        assert!(!task_finished("ACTIVE"));
        assert!(task_finished("SUCCEEDED"));
        assert!(task_finished("FAILED"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = TransferClient::new("https://example.org/v0.10/", "tok").unwrap();
        assert_eq!(client.url("task_list"), "https://example.org/v0.10/task_list");
    }
}
