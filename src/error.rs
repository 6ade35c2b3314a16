//! Error taxonomy for the CLI.
//!
//! Every failure a command can end with is a variant of [`Error`], and each
//! variant maps to one of the documented process exit codes.

use crate::constants;

/// Failure talking to a Globus service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{code} ({status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not logged in, run `globus login` first")]
    NotLoggedIn,
    #[error("was not able to authorize: {0}")]
    Api(#[from] ApiError),
    #[error("token response did not contain a {0} token")]
    MissingToken(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not determine the home directory")]
    NoHome,
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to write settings TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no bookmark named '{0}'")]
    UnknownBookmark(String),
}

#[derive(Debug, thiserror::Error)]
#[error("could not get info for endpoint {endpoint}: {source}")]
pub struct EndpointInfoError {
    pub endpoint: String,
    #[source]
    pub source: ApiError,
}

#[derive(Debug, thiserror::Error)]
#[error("was not able to activate endpoint(s) {}", .endpoints.join(", "))]
pub struct EndpointActivationError {
    pub endpoints: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskWaitError {
    #[error("task {task_id} did not finish after {attempts} attempt(s)")]
    Timeout { task_id: String, attempts: u32 },
    #[error("error while waiting for task {task_id} ({attempts} attempt(s)): {source}")]
    TransportFailure {
        task_id: String,
        attempts: u32,
        #[source]
        source: ApiError,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid transfer specification '{spec}' ({reason})")]
pub struct InvalidTransferSpecification {
    pub spec: String,
    pub reason: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("not running inside a job and no job ad found at {0}")]
    MissingJobContext(String),
    #[error("job ad is missing attribute {0}")]
    MissingAttribute(&'static str),
    #[error("cannot set job attributes in universe {0}")]
    UnsupportedUniverse(i64),
    #[error("failed to read job ad: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed job ad line: {0}")]
    Parse(String),
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("unexpected condor_q output: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    EndpointInfo(#[from] EndpointInfoError),
    #[error(transparent)]
    EndpointActivation(#[from] EndpointActivationError),
    #[error("endpoint(s) {} require manual activation, run `globus release` from a terminal", .0.join(", "))]
    NeedsUserInput(Vec<String>),
    #[error(transparent)]
    TaskWait(#[from] TaskWaitError),
    #[error(transparent)]
    InvalidTransferSpecification(#[from] InvalidTransferSpecification),
    #[error("could not release job(s) {}, see the log above", .0.join(", "))]
    ReleaseFailed(Vec<String>),
    #[error("could not cancel task {task_id}: {message}")]
    CancelTask { task_id: String, message: String },
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Auth(_) => constants::AUTHORIZATION_ERROR,
            Error::EndpointInfo(_) => constants::ENDPOINT_INFO_ERROR,
            Error::EndpointActivation(_) | Error::ReleaseFailed(_) => {
                constants::ENDPOINT_ACTIVATION_ERROR
            }
            Error::NeedsUserInput(_) => constants::NEEDS_USER_INPUT,
            Error::TaskWait(TaskWaitError::Timeout { .. }) => constants::WAIT_TASK_TIMEOUT,
            Error::TaskWait(TaskWaitError::TransportFailure { .. }) => {
                constants::WAIT_TASK_ERROR
            }
            Error::InvalidTransferSpecification(_) => {
                constants::INVALID_TRANSFER_SPECIFICATION_ERROR
            }
            Error::CancelTask { .. } => constants::CANCEL_TASK_ERROR,
            Error::Settings(_) | Error::Job(_) | Error::Api(_) | Error::Io(_) => {
                constants::GENERIC_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
