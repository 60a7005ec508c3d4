//! The job table: every background or suspended job and its observable status.
//!
//! Background processes are never waited on with a blocking call. Their
//! status is discovered by `JobTable::poll_all`, which the shell runs once per
//! prompt, so a job that exits is reported at the next prompt at the latest.

use std::fmt;
use std::io::Write;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::core::job::{Job, JobId, JobState};
use crate::errors::{ErrorKind, Result};

#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    /// Slots come from this counter and are never handed out twice, even after
    /// the table is swept.
    job_count: u32,
}

impl JobTable {
    pub fn add(&mut self, input: &str, pids: &[Pid], state: JobState) -> JobId {
        let job_id = self.get_next_job_id();
        self.jobs.push(Job::new(job_id, input, pids, state));
        debug!("added job [{}] ({}) for {:?}", job_id, state, pids);
        job_id
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == job_id)
    }

    /// Checks every unfinished job without blocking, printing one status line
    /// to `out` the first time a job is seen to have exited or been killed.
    /// Stops and continues update the state silently.
    pub fn poll_all(&mut self, out: &mut dyn Write) -> Result<()> {
        for job in &mut self.jobs {
            if job.state().is_terminal() {
                continue;
            }

            for pid in job.live_pids() {
                let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
                record_wait(job, pid, wait::waitpid(pid, Some(flags)));
            }

            if job.mark_notified() {
                writeln!(out, "{}", job)?;
            }
        }

        Ok(())
    }

    /// Writes one line per job for the `jobs` builtin.
    ///
    /// Finished jobs that have not been reported yet are shown once and count
    /// as reported; already reported ones are skipped.
    pub fn list(&mut self, out: &mut dyn Write, show_pids: bool) -> Result<()> {
        for job in &mut self.jobs {
            if job.state().is_terminal() && !job.mark_notified() {
                continue;
            }

            if show_pids {
                writeln!(
                    out,
                    "[{}] {} {}\t{}",
                    job.id(),
                    job.pid(),
                    job.state(),
                    job.input()
                )?;
            } else {
                writeln!(out, "{}", job)?;
            }
        }

        Ok(())
    }

    /// Sends `SIGCONT` to the job and marks it running.
    pub fn resume(&mut self, job_id: JobId) -> Result<()> {
        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.id() == job_id)
            .ok_or_else(|| ErrorKind::InvalidSlot(job_id.to_string()))?;

        if job.state().is_terminal() {
            return Err(ErrorKind::JobFinished(job_id.0).into());
        }

        debug!("continuing job [{}]", job_id);
        for pid in job.live_pids() {
            signal::kill(pid, Signal::SIGCONT)?;
        }
        job.mark_continued();
        Ok(())
    }

    /// Clears the table once every job has finished and been reported. A
    /// running or stopped job keeps every entry alive.
    pub fn sweep_if_all_notified(&mut self) -> bool {
        if self.jobs.is_empty() || !self.jobs.iter().all(Job::notified) {
            return false;
        }

        debug!("sweeping {} finished jobs", self.jobs.len());
        self.jobs.clear();
        true
    }

    fn get_next_job_id(&mut self) -> JobId {
        self.job_count += 1;
        JobId(self.job_count)
    }
}

impl fmt::Debug for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} jobs\tjob_count: {}", self.jobs.len(), self.job_count)?;
        for job in &self.jobs {
            writeln!(f, "{:?}", job)?;
        }

        Ok(())
    }
}

/// Folds one non-blocking `waitpid` result into `job`. Unexpected errors are
/// logged and the process is polled again on the next cycle.
fn record_wait(job: &mut Job, pid: Pid, result: nix::Result<WaitStatus>) {
    match result {
        Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => (),
        Ok(wait_status) => job.update(&wait_status),
        Err(Errno::ECHILD) => {
            // Someone else reaped it; there is no status left to collect, so
            // count it as a plain exit.
            warn!("{} is no longer a child of this shell", pid);
            job.update(&WaitStatus::Exited(pid, 0));
        }
        Err(e) => warn!("failed to poll {} in job [{}]: {}", pid, job.id(), e),
    }
}
