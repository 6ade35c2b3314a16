//! HTCondor integration: job ads, the `Scheduler` collaborator, and the
//! bridge that parks endpoints needing manual activation as job attributes
//! until someone runs `globus release` from a terminal.
//!
//! Attribute keys cannot be deleted, only overwritten, so a resolved record
//! is overwritten with `undefined`. Key allocation is not coordinated across
//! processes: a job is assumed to be written by one live process at a time,
//! plus at most one later `release`.

pub mod classad;
pub mod condor;

use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::Env;
use crate::constants;
use crate::error::JobError;

use self::classad::ClassAdValue;

pub use condor::CondorCli;

/// Access to the batch scheduler.
pub trait Scheduler {
    /// Job ads matching `constraint`.
    fn query(&self, constraint: &str) -> Result<Vec<JobAd>, JobError>;

    /// Set `key = value` on every job matching `constraint` (out of process).
    fn edit(&self, constraint: &str, key: &str, value: &str) -> Result<(), JobError>;

    /// Set `key = value` on the job this process runs in (chirp).
    fn chirp_set_job_attr(&self, key: &str, value: &str) -> Result<(), JobError>;

    fn release(&self, constraint: &str) -> Result<(), JobError>;
}

/// Execution class of a job. Decides how attributes can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Universe {
    Vanilla,
    Local,
    Other(i64),
}

impl Universe {
    pub fn from_code(code: i64) -> Self {
        match code {
            constants::VANILLA_UNIVERSE => Universe::Vanilla,
            constants::LOCAL_UNIVERSE => Universe::Local,
            other => Universe::Other(other),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Universe::Vanilla => "VANILLA".into(),
            Universe::Local => "LOCAL".into(),
            Universe::Other(code) => code.to_string(),
        }
    }
}

/// What an attribute currently holds, as far as endpoint records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrState<'a> {
    Set(&'a str),
    /// Overwritten with `undefined`.
    Cleared,
    /// Never written, or holding something that is not a string.
    Absent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobAd {
    attrs: BTreeMap<String, ClassAdValue>,
}

impl JobAd {
    pub fn new(attrs: BTreeMap<String, ClassAdValue>) -> Self {
        Self { attrs }
    }

    pub fn parse(text: &str) -> Result<Self, JobError> {
        Ok(Self::new(classad::parse_ad(text)?))
    }

    /// Attribute lookup; ClassAd names are case-insensitive.
    pub fn get(&self, key: &str) -> Option<&ClassAdValue> {
        self.attrs.get(key).or_else(|| {
            self.attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn set(&mut self, key: &str, value: ClassAdValue) {
        self.attrs.insert(key.to_string(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn attr_state(&self, key: &str) -> AttrState<'_> {
        match self.get(key) {
            Some(ClassAdValue::Str(s)) => AttrState::Set(s),
            Some(ClassAdValue::Undefined) => AttrState::Cleared,
            _ => AttrState::Absent,
        }
    }

    fn int(&self, key: &'static str) -> Result<i64, JobError> {
        match self.get(key) {
            Some(ClassAdValue::Int(i)) => Ok(*i),
            _ => Err(JobError::MissingAttribute(key)),
        }
    }

    pub fn cluster_id(&self) -> Result<i64, JobError> {
        self.int("ClusterId")
    }

    pub fn proc_id(&self) -> i64 {
        self.int("ProcId").unwrap_or(0)
    }

    pub fn universe(&self) -> Result<Universe, JobError> {
        self.int("JobUniverse").map(Universe::from_code)
    }

    pub fn status(&self) -> Option<i64> {
        self.int("JobStatus").ok()
    }

    /// `cluster.proc`
    pub fn job_id(&self) -> String {
        match self.cluster_id() {
            Ok(cluster) => format!("{cluster}.{}", self.proc_id()),
            Err(_) => "?".into(),
        }
    }

    /// Constraint selecting exactly this job.
    pub fn constraint(&self) -> Result<String, JobError> {
        Ok(format!(
            "ClusterId == {} && ProcId == {}",
            self.cluster_id()?,
            self.proc_id()
        ))
    }
}

pub fn status_name(status: i64) -> &'static str {
    match status {
        1 => "IDLE",
        2 => "RUNNING",
        3 => "REMOVED",
        4 => "COMPLETED",
        5 => "HELD",
        _ => "UNKNOWN",
    }
}

fn pending_key(ordinal: u32) -> String {
    format!("{}_{ordinal}", constants::ENDPOINT_ACTIVATION_REQUIRED)
}

/// Ordinal of a record key. The prefix matches in any case, like every
/// ClassAd attribute name.
fn pending_ordinal(key: &str) -> Option<u32> {
    let prefix = constants::ENDPOINT_ACTIVATION_REQUIRED;
    let head = key.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    key[prefix.len()..].strip_prefix('_')?.parse().ok()
}

/// Records endpoints that need manual activation on the job this process is
/// running as.
///
/// The job ad is loaded on first use, so runs that never need to record
/// anything also work outside a job.
pub struct BatchJobBridge<'a> {
    scheduler: &'a dyn Scheduler,
    job: OnceCell<JobAd>,
    job_ad_path: Option<PathBuf>,
    next_ordinal: Cell<Option<u32>>,
}

impl<'a> BatchJobBridge<'a> {
    pub fn new(scheduler: &'a dyn Scheduler, job: JobAd) -> Self {
        Self {
            scheduler,
            job: OnceCell::from(job),
            job_ad_path: None,
            next_ordinal: Cell::new(None),
        }
    }

    /// Use the ad snapshot HTCondor leaves in the job's scratch directory.
    pub fn from_env(scheduler: &'a dyn Scheduler, env: &dyn Env) -> Self {
        Self {
            scheduler,
            job: OnceCell::new(),
            job_ad_path: env
                .var(constants::SCRATCH_DIR_ENV)
                .ok()
                .map(|dir| PathBuf::from(dir).join(constants::JOB_AD_FILE_NAME)),
            next_ordinal: Cell::new(None),
        }
    }

    /// The current job's ad. Without a job ad there is no way to tell which
    /// job to write to, which is fatal.
    pub fn job(&self) -> Result<&JobAd, JobError> {
        if let Some(job) = self.job.get() {
            return Ok(job);
        }
        let missing = || {
            JobError::MissingJobContext(format!(
                "${}/{}",
                constants::SCRATCH_DIR_ENV,
                constants::JOB_AD_FILE_NAME
            ))
        };
        let path = self.job_ad_path.as_ref().ok_or_else(missing)?;
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobError::MissingJobContext(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Read job ad from {}", path.display());
        let _ = self.job.set(JobAd::parse(&text)?);
        self.job.get().ok_or_else(missing)
    }

    fn next_ordinal(&self) -> Result<u32, JobError> {
        if let Some(next) = self.next_ordinal.get() {
            return Ok(next);
        }
        Ok(self
            .job()?
            .keys()
            .filter_map(pending_ordinal)
            .max()
            .map_or(0, |max| max + 1))
    }

    /// Write `key = value` on the current job, the way its universe allows.
    fn set_job_attr(&self, key: &str, value: &str) -> Result<(), JobError> {
        let job = self.job()?;
        match job.universe()? {
            Universe::Vanilla => self.scheduler.chirp_set_job_attr(key, value)?,
            Universe::Local => {
                let constraint = format!("ClusterId == {}", job.cluster_id()?);
                tracing::debug!("Calling edit with constraint {constraint} to set {key} = {value}");
                self.scheduler.edit(&constraint, key, value)?;
            }
            Universe::Other(code) => return Err(JobError::UnsupportedUniverse(code)),
        }
        tracing::debug!("Set job attribute {key} = {value}");
        Ok(())
    }

    /// Park `endpoint_id` under the next unused ordinal. Returns the ordinal.
    pub fn record_pending_manual_activation(&self, endpoint_id: &str) -> Result<u32, JobError> {
        let ordinal = self.next_ordinal()?;
        self.set_job_attr(&pending_key(ordinal), &classad::quote(endpoint_id))?;
        self.next_ordinal.set(Some(ordinal + 1));
        Ok(ordinal)
    }

    /// Endpoint records on `job` that have not been cleared, by ordinal.
    pub fn list_pending_manual_activations(job: &JobAd) -> BTreeMap<u32, String> {
        job.keys()
            .filter_map(|key| {
                let ordinal = pending_ordinal(key)?;
                match job.attr_state(key) {
                    AttrState::Set(endpoint) => Some((ordinal, endpoint.to_string())),
                    AttrState::Cleared | AttrState::Absent => None,
                }
            })
            .collect()
    }

    /// Overwrite every record of `endpoint_id` on `job` with `undefined`,
    /// in the scheduler and in `job`, under the key as the ad spells it.
    /// Returns how many were cleared.
    pub fn resolve_and_clear(
        scheduler: &dyn Scheduler,
        job: &mut JobAd,
        endpoint_id: &str,
    ) -> Result<usize, JobError> {
        let keys: Vec<String> = job
            .keys()
            .filter(|key| pending_ordinal(key).is_some())
            .filter(|key| job.attr_state(key) == AttrState::Set(endpoint_id))
            .map(str::to_string)
            .collect();
        let constraint = job.constraint()?;
        for key in &keys {
            scheduler.edit(&constraint, key, classad::UNDEFINED)?;
            job.set(key, ClassAdValue::Undefined);
            tracing::debug!("Cleared {key} on job {}", job.job_id());
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnv;
    use crate::mock::MockScheduler;
    use tempfile::TempDir;

    fn ad(text: &str) -> JobAd {
        JobAd::parse(text).unwrap()
    }

    #[test]
    fn vanilla_jobs_write_through_chirp() {
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::new(&scheduler, ad("ClusterId = 3\nJobUniverse = 5"));

        assert_eq!(bridge.record_pending_manual_activation("ep1").unwrap(), 0);
        assert_eq!(bridge.record_pending_manual_activation("ep2").unwrap(), 1);

        assert_eq!(
            *scheduler.chirp_writes.borrow(),
            vec![
                ("GlobusEndpointActivationRequired_0".to_string(), "\"ep1\"".to_string()),
                ("GlobusEndpointActivationRequired_1".to_string(), "\"ep2\"".to_string()),
            ]
        );
        assert!(scheduler.edits.borrow().is_empty());
    }

    #[test]
    fn local_jobs_edit_by_cluster_id() {
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::new(&scheduler, ad("ClusterId = 17\nJobUniverse = 12"));

        bridge.record_pending_manual_activation("ep1").unwrap();

        assert_eq!(
            *scheduler.edits.borrow(),
            vec![(
                "ClusterId == 17".to_string(),
                "GlobusEndpointActivationRequired_0".to_string(),
                "\"ep1\"".to_string()
            )]
        );
        assert!(scheduler.chirp_writes.borrow().is_empty());
    }

    #[test]
    fn other_universes_cannot_record() {
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::new(&scheduler, ad("ClusterId = 1\nJobUniverse = 7"));
        assert!(matches!(
            bridge.record_pending_manual_activation("ep1"),
            Err(JobError::UnsupportedUniverse(7))
        ));
    }

    #[test]
    fn ordinals_continue_after_existing_records() {
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::new(
            &scheduler,
            ad("ClusterId = 1\nJobUniverse = 5\n\
                GlobusEndpointActivationRequired_0 = undefined\n\
                GlobusEndpointActivationRequired_4 = \"old\""),
        );
        assert_eq!(bridge.record_pending_manual_activation("ep").unwrap(), 5);
    }

    #[test]
    fn listing_skips_cleared_records() {
        let job = ad("ClusterId = 1\n\
                      GlobusEndpointActivationRequired_0 = undefined\n\
                      GlobusEndpointActivationRequired_1 = \"ep-b\"\n\
                      GlobusEndpointActivationRequired_x = \"not-an-ordinal\"\n\
                      Owner = \"alice\"");
        let pending = BatchJobBridge::list_pending_manual_activations(&job);
        assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![(1, "ep-b".to_string())]);
    }

    #[test]
    fn resolve_and_clear_overwrites_with_undefined() {
        let scheduler = MockScheduler::new();
        let mut job = ad("ClusterId = 9\nProcId = 2\n\
                          GlobusEndpointActivationRequired_0 = \"ep-a\"\n\
                          GlobusEndpointActivationRequired_1 = \"ep-b\"");

        let cleared = BatchJobBridge::resolve_and_clear(&scheduler, &mut job, "ep-a").unwrap();

        assert_eq!(cleared, 1);
        assert_eq!(
            *scheduler.edits.borrow(),
            vec![(
                "ClusterId == 9 && ProcId == 2".to_string(),
                "GlobusEndpointActivationRequired_0".to_string(),
                "undefined".to_string()
            )]
        );
        assert_eq!(
            job.attr_state("GlobusEndpointActivationRequired_0"),
            AttrState::Cleared
        );
        let remaining = BatchJobBridge::list_pending_manual_activations(&job);
        assert_eq!(remaining.values().collect::<Vec<_>>(), vec!["ep-b"]);
    }

    #[test]
    fn clearing_keeps_the_ads_own_key_casing() {
        let scheduler = MockScheduler::new();
        let mut job = ad("ClusterId = 9\nProcId = 0\nJobStatus = 5\n\
                          globusendpointactivationrequired_3 = \"ep-a\"");
        assert_eq!(
            BatchJobBridge::list_pending_manual_activations(&job)
                .into_iter()
                .collect::<Vec<_>>(),
            vec![(3, "ep-a".to_string())]
        );

        let cleared = BatchJobBridge::resolve_and_clear(&scheduler, &mut job, "ep-a").unwrap();

        assert_eq!(cleared, 1);
        assert_eq!(
            scheduler.edits.borrow()[0].1,
            "globusendpointactivationrequired_3"
        );
        assert!(BatchJobBridge::list_pending_manual_activations(&job).is_empty());
        assert_eq!(job.keys().filter(|k| pending_ordinal(k).is_some()).count(), 1);
    }

    #[test]
    fn recording_without_scratch_dir_is_missing_context() {
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::from_env(&scheduler, &MapEnv::default());
        assert!(matches!(
            bridge.record_pending_manual_activation("ep1"),
            Err(JobError::MissingJobContext(_))
        ));
        assert!(scheduler.edits.borrow().is_empty());
        assert!(scheduler.chirp_writes.borrow().is_empty());
    }

    #[test]
    fn recording_without_job_ad_file_is_missing_context() {
        let dir = TempDir::new().unwrap();
        let env = MapEnv::default().with(constants::SCRATCH_DIR_ENV, dir.path().to_str().unwrap());
        let scheduler = MockScheduler::new();
        let bridge = BatchJobBridge::from_env(&scheduler, &env);
        assert!(matches!(bridge.job(), Err(JobError::MissingJobContext(_))));
    }

    #[test]
    fn job_ad_is_read_from_scratch_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".job.ad"),
            "ClusterId = 12\nProcId = 0\nJobUniverse = 12\n\
             GlobusEndpointActivationRequired_1 = \"old\"\n",
        )
        .unwrap();
        let env = MapEnv::default().with(constants::SCRATCH_DIR_ENV, dir.path().to_str().unwrap());
        let scheduler = MockScheduler::new();

        let bridge = BatchJobBridge::from_env(&scheduler, &env);

        assert_eq!(bridge.job().unwrap().universe().unwrap(), Universe::Local);
        assert_eq!(bridge.record_pending_manual_activation("ep").unwrap(), 2);
        assert_eq!(scheduler.edits.borrow()[0].0, "ClusterId == 12");
    }
}
