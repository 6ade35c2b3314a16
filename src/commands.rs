//! One function per subcommand. Each takes its collaborators explicitly and
//! writes its normal output to `out`; errors carry their exit codes back to
//! `main`.

use std::io::Write;

use crate::activation::{ActivationEngine, ActivationResult, ManualActivationPrompt, RunMode};
use crate::api::{TransferApi, TransferData, TransferItem, SYNC_LEVEL_CHECKSUM};
use crate::auth::{NativeAppAuth, PkceFlow};
use crate::config::{self, Env};
use crate::constants;
use crate::endpoints::EndpointInfoProvider;
use crate::error::{AuthError, Error, Result};
use crate::formatting::Table;
use crate::jobs::{classad, status_name, BatchJobBridge, JobAd, Scheduler};
use crate::settings::Settings;
use crate::ui;
use crate::wait::{TaskWaiter, WaitOptions};

/// The collaborators a remote command works with.
pub struct Session<'a> {
    pub api: &'a dyn TransferApi,
    pub scheduler: &'a dyn Scheduler,
    pub env: &'a dyn Env,
    pub prompt: &'a dyn ManualActivationPrompt,
    /// Whether a human is at the terminal; decides how manual activation is
    /// handled.
    pub interactive: bool,
    /// Colors and bold headers on stdout.
    pub styled: bool,
}

impl<'a> Session<'a> {
    /// Activate `endpoints`. In a batch job, endpoints that need a human are
    /// recorded on the job and reported as `NeedsUserInput`.
    pub fn ensure_active(&self, endpoints: &[String]) -> Result<ActivationResult> {
        let result = if self.interactive {
            ActivationEngine::new(self.api, RunMode::Interactive(self.prompt))
                .activate_all(endpoints)?
        } else {
            let bridge = BatchJobBridge::from_env(self.scheduler, self.env);
            ActivationEngine::new(self.api, RunMode::Batch(&bridge)).activate_all(endpoints)?
        };
        if !result.is_complete() {
            return Err(Error::NeedsUserInput(result.unresolved.into_iter().collect()));
        }
        Ok(result)
    }
}

/// Build a transfer client from the stored refresh token.
pub fn connect(env: &dyn Env, settings: &Settings) -> Result<crate::api::TransferClient> {
    let refresh_token = settings
        .auth
        .refresh_token
        .as_deref()
        .ok_or(AuthError::NotLoggedIn)?;
    let auth = NativeAppAuth::from_env(env).map_err(AuthError::from)?;
    let access_token = auth.access_token(refresh_token)?;
    Ok(crate::api::TransferClient::from_env(env, access_token)?)
}

pub fn login(env: &dyn Env, settings: &mut Settings, out: &mut dyn Write) -> Result<()> {
    let auth = NativeAppAuth::from_env(env).map_err(AuthError::from)?;
    let flow = PkceFlow::start();
    let code = ui::prompt_auth_code(&auth.authorize_url(&flow))?;
    let refresh_token = auth.exchange_code(flow, &code).map_err(|e| {
        tracing::error!("Was not able to authorize: {e}");
        e
    })?;
    tracing::debug!("Acquired refresh token");
    settings.auth.refresh_token = Some(refresh_token);
    let path = settings.save()?;
    writeln!(out, "Logged in, credentials saved to {}", path.display())?;
    Ok(())
}

pub fn bookmark_add(
    settings: &mut Settings,
    name: &str,
    endpoint: &str,
    out: &mut dyn Write,
) -> Result<()> {
    settings.add_bookmark(name, endpoint);
    settings.save()?;
    writeln!(out, "Added bookmark {name} -> {endpoint}")?;
    Ok(())
}

pub fn bookmark_rm(settings: &mut Settings, name: &str, out: &mut dyn Write) -> Result<()> {
    let endpoint = settings.remove_bookmark(name)?;
    settings.save()?;
    writeln!(out, "Removed bookmark {name} -> {endpoint}")?;
    Ok(())
}

pub fn bookmark_ls(settings: &Settings, styled: bool, out: &mut dyn Write) -> Result<()> {
    let mut table = Table::new(constants::BOOKMARKS_HEADERS, constants::BOOKMARKS_HEADERS);
    for (name, endpoint) in &settings.bookmarks {
        table.row(vec![name.clone(), endpoint.clone()]);
    }
    writeln!(out, "{}", table.render(styled))?;
    Ok(())
}

pub fn endpoints(
    session: &Session,
    filter: Option<&str>,
    limit: usize,
    out: &mut dyn Write,
) -> Result<()> {
    let mut table = Table::new(
        constants::DEFAULT_ENDPOINTS_HEADERS,
        constants::DEFAULT_ENDPOINTS_HEADERS,
    );
    for ep in session.api.endpoint_search(filter, limit)? {
        table.row(vec![ep.id, ep.display_name.unwrap_or_default()]);
    }
    writeln!(out, "{}", table.render(session.styled))?;
    Ok(())
}

pub fn info(
    session: &Session,
    settings: &Settings,
    endpoint: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let snapshot = EndpointInfoProvider::new(session.api).fetch(settings.resolve(endpoint))?;
    let expires = match snapshot.expires_in {
        Some(d) => format!("{}s", d.as_secs()),
        None => "never".to_string(),
    };
    writeln!(out, "id            {}", snapshot.id)?;
    writeln!(out, "display_name  {}", snapshot.display_name)?;
    writeln!(out, "activated     {}", snapshot.is_active)?;
    writeln!(out, "expires_in    {expires}")?;
    Ok(())
}

pub fn activate(
    session: &Session,
    settings: &Settings,
    endpoints: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let ids: Vec<String> = endpoints
        .iter()
        .map(|e| settings.resolve(e).to_string())
        .collect();
    let result = session.ensure_active(&ids)?;
    for id in &result.activated {
        writeln!(out, "Endpoint {id} is active")?;
    }
    Ok(())
}

pub fn ls(
    session: &Session,
    settings: &Settings,
    endpoint: &str,
    path: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let id = settings.resolve(endpoint).to_string();
    session.ensure_active(std::slice::from_ref(&id))?;
    let mut table = Table::new(constants::DEFAULT_LS_HEADERS, &["type", "name"]);
    for entry in session.api.operation_ls(&id, path)? {
        table.row(vec![entry.kind, entry.name, entry.size.to_string()]);
    }
    writeln!(out, "{}", table.render(session.styled))?;
    Ok(())
}

/// A transfer whose specs were already validated.
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub items: Vec<TransferItem>,
    pub label: Option<String>,
    pub wait: Option<WaitOptions>,
}

pub fn transfer(
    session: &Session,
    settings: &Settings,
    request: TransferRequest,
    out: &mut dyn Write,
) -> Result<()> {
    let source = settings.resolve(&request.source).to_string();
    let destination = settings.resolve(&request.destination).to_string();

    session.ensure_active(&[source.clone(), destination.clone()])?;

    let handle = session.api.submit_transfer(&TransferData {
        source_endpoint: source,
        destination_endpoint: destination,
        label: request.label,
        sync_level: SYNC_LEVEL_CHECKSUM,
        items: request.items,
    })?;
    writeln!(out, "Transfer task id is {}", handle.task_id)?;

    if let Some(options) = request.wait {
        wait(session, &handle.task_id, options, out)?;
    }
    Ok(())
}

pub fn wait(
    session: &Session,
    task_id: &str,
    options: WaitOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let spinner = ui::spinner(format!("Waiting for task {task_id}"));
    let result = TaskWaiter::new(session.api).wait(task_id, options);
    spinner.finish_and_clear();
    result?;
    writeln!(out, "Task {task_id} is done")?;
    Ok(())
}

pub fn cancel(session: &Session, task_id: &str, out: &mut dyn Write) -> Result<()> {
    let response = session.api.cancel_task(task_id)?;
    if response.code != constants::TASK_CANCELED {
        tracing::error!("Could not cancel task {task_id}: {}", response.code);
        return Err(Error::CancelTask {
            task_id: task_id.to_string(),
            message: response.message,
        });
    }
    writeln!(out, "{}", response.message)?;
    Ok(())
}

pub fn history(session: &Session, limit: usize, out: &mut dyn Write) -> Result<()> {
    let mut table = Table::new(constants::DEFAULT_HISTORY_HEADERS, &["task_id", "label"]);
    for task in session.api.task_list(limit)? {
        table.row(vec![
            task.task_id,
            task.label.unwrap_or_default(),
            task.status,
            task.source_endpoint_display_name
                .or(task.source_endpoint_id)
                .unwrap_or_default(),
            task.destination_endpoint_display_name
                .or(task.destination_endpoint_id)
                .unwrap_or_default(),
            task.completion_time.unwrap_or_default(),
        ]);
    }
    writeln!(out, "{}", table.render(session.styled))?;
    Ok(())
}

/// Constraint matching this tool's jobs, restricted to `user` when known.
pub fn globus_jobs_constraint(user: Option<&str>) -> String {
    match user {
        Some(user) => format!(
            "{} && Owner == {}",
            constants::IS_GLOBUS_JOB,
            classad::quote(user)
        ),
        None => constants::IS_GLOBUS_JOB.to_string(),
    }
}

pub fn jobs(
    scheduler: &dyn Scheduler,
    env: &dyn Env,
    styled: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let constraint = globus_jobs_constraint(config::current_user(env).as_deref());
    let mut table = Table::new(constants::JOBS_HEADERS, &["job", "pending_endpoints"]);
    for job in scheduler.query(&constraint)? {
        let status = job.status().map_or("UNKNOWN", status_name);
        let pending: Vec<String> = BatchJobBridge::list_pending_manual_activations(&job)
            .into_values()
            .collect();
        table.colored_row(
            vec![job.job_id(), status.to_string(), pending.join(", ")],
            ui::job_status_color(status),
        );
    }
    writeln!(out, "{}", table.render(styled))?;
    Ok(())
}

/// Activate, interactively, every endpoint a job recorded, clear the
/// records, and release held jobs that have nothing left pending.
///
/// A job that fails is logged and skipped; the others are still handled.
pub fn release(session: &Session, out: &mut dyn Write) -> Result<()> {
    let constraint = globus_jobs_constraint(config::current_user(session.env).as_deref());
    let engine = ActivationEngine::new(session.api, RunMode::Interactive(session.prompt));

    let mut failed = Vec::new();
    for mut job in session.scheduler.query(&constraint)? {
        if let Err(e) = release_job(session, &engine, &mut job, out) {
            tracing::error!("Skipping job {}: {e}", job.job_id());
            failed.push(job.job_id());
        }
    }
    if !failed.is_empty() {
        return Err(Error::ReleaseFailed(failed));
    }
    Ok(())
}

fn release_job(
    session: &Session,
    engine: &ActivationEngine,
    job: &mut JobAd,
    out: &mut dyn Write,
) -> Result<()> {
    let pending = BatchJobBridge::list_pending_manual_activations(job);
    if pending.is_empty() {
        return Ok(());
    }
    let endpoints: Vec<String> = pending.into_values().collect();
    tracing::debug!(
        "Job {} needs endpoint(s) {}",
        job.job_id(),
        endpoints.join(", ")
    );

    let result = engine.activate_all(&endpoints)?;
    for endpoint in &result.activated {
        BatchJobBridge::resolve_and_clear(session.scheduler, job, endpoint)?;
    }

    if !BatchJobBridge::list_pending_manual_activations(job).is_empty() {
        return Ok(());
    }
    if job.status() == Some(constants::HELD_STATUS) {
        session.scheduler.release(&job.constraint()?)?;
        writeln!(out, "Released job {}", job.job_id())?;
    } else {
        writeln!(out, "Cleared pending activations for job {}", job.job_id())?;
    }
    Ok(())
}
