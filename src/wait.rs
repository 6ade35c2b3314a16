//! Waiting for a submitted task, with a bounded number of attempts.
//!
//! Each attempt is one blocking `task_wait` call on the transfer service,
//! which polls on its own until the task finishes or the per-attempt timeout
//! elapses. A transport error only ends its attempt; the loop carries on and
//! remembers it, so that running out of attempts can be told apart from a
//! clean timeout.

use std::time::Duration;

use crate::api::TransferApi;
use crate::error::{ApiError, TaskWaitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout_per_attempt: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl WaitOptions {
    pub fn from_secs(timeout: u64, interval: u64, attempts: u32) -> Self {
        WaitOptions {
            timeout_per_attempt: Duration::from_secs(timeout),
            poll_interval: Duration::from_secs(interval),
            max_attempts: attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Waiting,
    Succeeded,
    ExhaustedClean,
    ExhaustedWithError,
}

/// Bookkeeping for one `wait` call.
#[derive(Debug)]
struct WaitAttemptState {
    attempts_made: u32,
    max_attempts: u32,
    last_error: Option<ApiError>,
    state: WaitState,
}

impl WaitAttemptState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            last_error: None,
            state: WaitState::Waiting,
        }
    }

    fn record(&mut self, outcome: Result<bool, ApiError>) {
        debug_assert_eq!(self.state, WaitState::Waiting);
        self.attempts_made += 1;
        match outcome {
            Ok(true) => {
                self.state = WaitState::Succeeded;
                return;
            }
            Ok(false) => {}
            Err(e) => self.last_error = Some(e),
        }
        if self.attempts_made >= self.max_attempts {
            self.state = if self.last_error.is_some() {
                WaitState::ExhaustedWithError
            } else {
                WaitState::ExhaustedClean
            };
        }
    }
}

pub struct TaskWaiter<'a> {
    api: &'a dyn TransferApi,
}

impl<'a> TaskWaiter<'a> {
    pub fn new(api: &'a dyn TransferApi) -> Self {
        Self { api }
    }

    pub fn wait(&self, task_id: &str, options: WaitOptions) -> Result<(), TaskWaitError> {
        let mut state = WaitAttemptState::new(options.max_attempts.max(1));

        while state.state == WaitState::Waiting {
            let attempt = state.attempts_made + 1;
            tracing::debug!(
                "Waiting for task {task_id} (attempt {attempt}/{}, timeout {:?}, interval {:?})",
                state.max_attempts,
                options.timeout_per_attempt,
                options.poll_interval
            );
            let outcome =
                self.api
                    .task_wait(task_id, options.timeout_per_attempt, options.poll_interval);
            if let Err(e) = &outcome {
                tracing::warn!(
                    "Error while waiting for task {task_id} (attempt {attempt}/{}), will keep waiting: {e}",
                    state.max_attempts
                );
            }
            state.record(outcome);
        }

        match state.state {
            WaitState::Succeeded => {
                tracing::debug!("Task {task_id} finished");
                Ok(())
            }
            WaitState::ExhaustedWithError => match state.last_error {
                Some(source) => Err(TaskWaitError::TransportFailure {
                    task_id: task_id.to_string(),
                    attempts: state.attempts_made,
                    source,
                }),
                None => Err(TaskWaitError::Timeout {
                    task_id: task_id.to_string(),
                    attempts: state.attempts_made,
                }),
            },
            WaitState::ExhaustedClean | WaitState::Waiting => Err(TaskWaitError::Timeout {
                task_id: task_id.to_string(),
                attempts: state.attempts_made,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransfer;

    fn transport_error() -> ApiError {
        ApiError::Service {
            status: 503,
            code: "ServiceUnavailable".into(),
            message: "try again".into(),
        }
    }

    #[test]
    fn completion_stops_immediately() {
        let api = MockTransfer::new();
        api.push_wait(Ok(false));
        api.push_wait(Ok(true));
        api.push_wait(Ok(false));

        TaskWaiter::new(&api)
            .wait("t1", WaitOptions::from_secs(60, 10, 5))
            .unwrap();

        assert_eq!(api.wait_calls(), 2);
    }

    #[test]
    fn error_on_final_attempt_is_transport_failure() {
        let api = MockTransfer::new();
        api.push_wait(Ok(false));
        api.push_wait(Ok(false));
        api.push_wait(Err(transport_error()));

        let err = TaskWaiter::new(&api)
            .wait("t1", WaitOptions::from_secs(60, 10, 3))
            .unwrap_err();

        assert!(matches!(
            err,
            TaskWaitError::TransportFailure { attempts: 3, .. }
        ));
        assert_eq!(api.wait_calls(), 3);
    }

    #[test]
    fn earlier_error_still_marks_exhaustion_as_failure() {
        let api = MockTransfer::new();
        api.push_wait(Err(transport_error()));
        api.push_wait(Ok(false));

        let err = TaskWaiter::new(&api)
            .wait("t1", WaitOptions::from_secs(60, 10, 2))
            .unwrap_err();

        assert!(matches!(err, TaskWaitError::TransportFailure { .. }));
    }

    #[test]
    fn single_clean_attempt_times_out() {
        let api = MockTransfer::new();
        api.push_wait(Ok(false));

        let err = TaskWaiter::new(&api)
            .wait("t1", WaitOptions::from_secs(60, 10, 1))
            .unwrap_err();

        assert!(matches!(err, TaskWaitError::Timeout { attempts: 1, .. }));
        assert_eq!(api.wait_calls(), 1);
    }

    #[test]
    fn error_then_success_is_success() {
        let api = MockTransfer::new();
        api.push_wait(Err(transport_error()));
        api.push_wait(Ok(true));

        assert!(TaskWaiter::new(&api)
            .wait("t1", WaitOptions::from_secs(60, 10, 3))
            .is_ok());
    }

    #[test]
    fn timeout_and_interval_reach_the_service() {
        let api = MockTransfer::new();
        api.push_wait(Ok(true));

        TaskWaiter::new(&api)
            .wait("t9", WaitOptions::from_secs(60, 10, 3))
            .unwrap();

        assert_eq!(api.calls(), vec!["task_wait:t9:60:10"]);
    }
}
