//! Job manager: creates jobs and answers status queries.

use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::computer::Computer;
use crate::error::{ServerError, ServerResult};
use crate::executor::Executor;
use crate::job::{JobId, JobRecord, JobStatus};
use crate::runner::{JobPayload, run_job};

/// Default cap on `num_shots` for one job.
pub const DEFAULT_MAX_SHOTS: u32 = 100_000;

/// Owns every job created by this process.
///
/// The map is insert-only. Each record inside it is written by its own
/// runner task, so the map lock is only held long enough to insert or clone
/// an `Arc`.
pub struct JobManager {
    executor: Arc<dyn Executor>,
    max_shots: u32,
    jobs: RwLock<FxHashMap<JobId, Arc<JobRecord>>>,
}

impl JobManager {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            max_shots: DEFAULT_MAX_SHOTS,
            jobs: RwLock::new(FxHashMap::default()),
        }
    }

    /// Reject jobs asking for more than `max_shots` repetitions.
    pub fn with_max_shots(mut self, max_shots: u32) -> Self {
        self.max_shots = max_shots;
        self
    }

    pub fn max_shots(&self) -> u32 {
        self.max_shots
    }

    /// Register a new `Running` job and start it in the background.
    ///
    /// Returns as soon as the job is registered; execution happens on its own
    /// task. Must be called from within a tokio runtime. A shot count above
    /// the configured maximum is rejected and no job is created.
    pub fn create_job(&self, computer: Arc<Computer>, payload: JobPayload) -> ServerResult<JobId> {
        if payload.num_shots > self.max_shots {
            return Err(ServerError::InvalidPayload(format!(
                "num_shots {} exceeds the limit of {}",
                payload.num_shots, self.max_shots
            )));
        }
        let job_id = JobId::generate();
        let record = Arc::new(JobRecord::new(computer.name(), payload.num_shots));

        {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            match jobs.entry(job_id.clone()) {
                Entry::Occupied(_) => {
                    tracing::error!(job_id = %job_id, "Job id collision");
                    return Err(ServerError::Internal(format!("job id collision: {job_id}")));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&record));
                }
            }
        }

        tracing::info!(
            job_id = %job_id,
            computer = %computer.name(),
            shots = payload.num_shots,
            executor = %self.executor.name(),
            "Job submitted"
        );
        tokio::spawn(run_job(
            job_id.clone(),
            computer,
            payload,
            record,
            Arc::clone(&self.executor),
        ));

        Ok(job_id)
    }

    pub fn has_job(&self, job_id: &JobId) -> bool {
        self.read_jobs().contains_key(job_id)
    }

    /// Current status of a job. A `Running` job may be polled again later.
    pub fn job_result(&self, job_id: &JobId) -> ServerResult<JobStatus> {
        Ok(self.record(job_id)?.status())
    }

    /// Shared record of a job, for callers that need more than its status.
    pub fn record(&self, job_id: &JobId) -> ServerResult<Arc<JobRecord>> {
        self.read_jobs()
            .get(job_id)
            .cloned()
            .ok_or_else(|| ServerError::JobNotFound(job_id.to_string()))
    }

    /// Poll a job every `poll_interval` until it is terminal or `timeout`
    /// elapses.
    pub async fn wait(
        &self,
        job_id: &JobId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> ServerResult<JobStatus> {
        let record = self.record(job_id)?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let status = record.status();
            if status.is_terminal() {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ServerError::Timeout(job_id.to_string()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Number of jobs created so far.
    pub fn job_count(&self) -> usize {
        self.read_jobs().len()
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, FxHashMap<JobId, Arc<JobRecord>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::ScriptedExecutor;
    use rustc_hash::FxHashSet;

    const POLL: Duration = Duration::from_millis(5);
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn manager() -> JobManager {
        JobManager::new(Arc::new(ScriptedExecutor))
    }

    fn computer(name: &str, secs: u64) -> Arc<Computer> {
        Arc::new(Computer::new(name, Duration::from_secs(secs)))
    }

    #[tokio::test]
    async fn test_create_and_complete() {
        let jobs = manager();
        let id = jobs
            .create_job(computer("GladOs", 0), JobPayload::new("count", 3))
            .unwrap();
        assert!(jobs.has_job(&id));

        let status = jobs.wait(&id, POLL, TIMEOUT).await.unwrap();
        assert_eq!(status.results().unwrap().len(), 3);
        assert_eq!(jobs.job_result(&id).unwrap(), status);
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let jobs = manager();
        jobs.create_job(computer("GladOs", 0), JobPayload::new("count", 1))
            .unwrap();

        let unknown = JobId::generate();
        assert!(!jobs.has_job(&unknown));
        assert!(matches!(
            jobs.job_result(&unknown),
            Err(ServerError::JobNotFound(_))
        ));
        assert!(jobs.wait(&unknown, POLL, TIMEOUT).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_until_queue_delay_elapses() {
        let jobs = manager();
        let id = jobs
            .create_job(computer("HAL-9000", 45), JobPayload::new("count", 2))
            .unwrap();

        assert_eq!(jobs.job_result(&id).unwrap(), JobStatus::Running);
        tokio::time::sleep(Duration::from_secs(44)).await;
        assert_eq!(jobs.job_result(&id).unwrap(), JobStatus::Running);

        let status = jobs
            .wait(&id, Duration::from_secs(1), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(status.results().unwrap(), ["0", "1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let jobs = manager();
        let id = jobs
            .create_job(computer("Quanti", 60), JobPayload::new("count", 1))
            .unwrap();

        let err = jobs
            .wait(&id, Duration::from_secs(1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_identical_payloads_get_distinct_ids() {
        let jobs = manager();
        let glados = computer("GladOs", 0);
        let a = jobs
            .create_job(Arc::clone(&glados), JobPayload::new("count", 50))
            .unwrap();
        let b = jobs
            .create_job(glados, JobPayload::new("count", 50))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(jobs.job_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_jobs_do_not_interfere() {
        let jobs = Arc::new(manager());
        let mut handles = Vec::new();
        for i in 0..32u32 {
            let jobs = Arc::clone(&jobs);
            handles.push(tokio::spawn(async move {
                let program = if i % 4 == 0 { "garbage" } else { "count" };
                let id = jobs
                    .create_job(computer("TARS", 0), JobPayload::new(program, i))
                    .unwrap();
                (i, id)
            }));
        }

        let mut ids = FxHashSet::default();
        for handle in handles {
            let (i, id) = handle.await.unwrap();
            let status = jobs.wait(&id, POLL, TIMEOUT).await.unwrap();
            if i % 4 == 0 {
                assert!(status.error().is_some());
            } else {
                assert_eq!(status.results().unwrap().len(), i as usize);
            }
            assert_eq!(jobs.record(&id).unwrap().num_shots(), i);
            assert!(ids.insert(id));
        }
        assert_eq!(jobs.job_count(), 32);
    }

    #[tokio::test]
    async fn test_terminal_state_is_stable() {
        let jobs = manager();
        let id = jobs
            .create_job(computer("TARS", 0), JobPayload::new("fail", 2))
            .unwrap();
        let first = jobs.wait(&id, POLL, TIMEOUT).await.unwrap();
        for _ in 0..10 {
            assert_eq!(jobs.job_result(&id).unwrap(), first);
        }
        assert!(jobs.record(&id).unwrap().finished_at().is_some());
    }

    #[tokio::test]
    async fn test_oversized_shot_count_rejected() {
        let jobs = manager();
        let err = jobs
            .create_job(computer("GladOs", 0), JobPayload::new("count", u32::MAX))
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidPayload(_)));
        assert_eq!(jobs.job_count(), 0);

        let jobs = manager().with_max_shots(3);
        assert_eq!(jobs.max_shots(), 3);
        assert!(jobs
            .create_job(computer("GladOs", 0), JobPayload::new("count", 4))
            .is_err());
        let id = jobs
            .create_job(computer("GladOs", 0), JobPayload::new("count", 3))
            .unwrap();
        let status = jobs.wait(&id, POLL, TIMEOUT).await.unwrap();
        assert_eq!(status.results().unwrap().len(), 3);
    }
}
