use std::fmt;

use nix::sys::{signal::Signal, wait::WaitStatus};
use nix::unistd::Pid;

/// Slot shown to the user in `[n]` and accepted by `bg n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    /// Exited with the given status code
    Done(i32),
    /// Killed by the given signal
    Terminated(Signal),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        match self {
            JobState::Done(_) | JobState::Terminated(_) => true,
            JobState::Running | JobState::Stopped => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobState::Running => write!(f, "Running"),
            JobState::Stopped => write!(f, "Stopped"),
            JobState::Done(0) => write!(f, "Done"),
            JobState::Done(code) => write!(f, "Exit {}", code),
            JobState::Terminated(_) => write!(f, "Terminated"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Process {
    pid: Pid,
    state: JobState,
}

impl Process {
    fn state(&self) -> JobState {
        self.state
    }

    /// A process in a terminal state has been reaped and must not be waited
    /// on or signaled again.
    fn is_reaped(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Clone)]
pub struct Job {
    id: JobId,
    input: String,
    processes: Vec<Process>,
    state: JobState,
    notified: bool,
}

impl Job {
    /// # Panics
    /// Panics if `pids` is empty
    pub fn new(id: JobId, input: &str, pids: &[Pid], state: JobState) -> Self {
        assert!(!pids.is_empty(), "a job needs at least one process");
        Self {
            id,
            input: input.to_string(),
            processes: pids.iter().map(|&pid| Process { pid, state }).collect(),
            state,
            notified: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Pid of the job's first process.
    pub fn pid(&self) -> Pid {
        self.processes[0].pid
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Whether the terminal state has been reported to the user.
    pub fn notified(&self) -> bool {
        self.notified
    }

    /// Records that the terminal state was reported. Returns `false` if it
    /// already was, or if the job has not terminated.
    pub fn mark_notified(&mut self) -> bool {
        if !self.state.is_terminal() || self.notified {
            return false;
        }
        self.notified = true;
        true
    }

    pub fn live_pids(&self) -> Vec<Pid> {
        self.processes
            .iter()
            .filter(|p| !p.is_reaped())
            .map(|p| p.pid)
            .collect()
    }

    /// Applies a `waitpid` report for one of this job's processes.
    pub fn update(&mut self, wait_status: &WaitStatus) {
        if self.state.is_terminal() {
            warn!(
                "ignoring {:?} for job [{}], already {}",
                wait_status, self.id, self.state
            );
            return;
        }

        let pid = match wait_status.pid() {
            Some(pid) => pid,
            None => return,
        };
        let process = match self.processes.iter_mut().find(|p| p.pid == pid) {
            Some(process) => process,
            None => {
                warn!("{} is not part of job [{}]", pid, self.id);
                return;
            }
        };

        match *wait_status {
            WaitStatus::Exited(_, code) => {
                debug!("{} exited with {}.", pid, code);
                process.state = JobState::Done(code);
            }
            WaitStatus::Signaled(_, signal, _) => {
                debug!("{} terminated by signal {:?}.", pid, signal);
                process.state = JobState::Terminated(signal);
            }
            WaitStatus::Stopped(_, signal) => {
                debug!("{} was signaled to stop {:?}.", pid, signal);
                process.state = JobState::Stopped;
            }
            WaitStatus::Continued(_) => {
                debug!("{} continued.", pid);
                process.state = JobState::Running;
            }
            _ => return,
        }

        self.state = self.derive_state();
    }

    /// Marks every live process running again, after `SIGCONT` was sent.
    pub fn mark_continued(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        for process in self.processes.iter_mut().filter(|p| !p.is_reaped()) {
            process.state = JobState::Running;
        }
        self.state = JobState::Running;
    }

    /// A job ends when its last process is reaped, and reports that
    /// process's status, as pipelines do.
    fn derive_state(&self) -> JobState {
        if self.processes.iter().all(Process::is_reaped) {
            self.processes
                .last()
                .map(Process::state)
                .unwrap_or(JobState::Done(0))
        } else if self
            .processes
            .iter()
            .any(|p| p.state == JobState::Stopped)
        {
            JobState::Stopped
        } else {
            JobState::Running
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {}\tpid: {}\tstate: {:?}\tinput: {}",
            self.id,
            self.pid(),
            self.state,
            self.input
        )
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}\t{}", self.id, self.state, self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn test_job_is_stopped_then_resumed() {
        let mut job = Job::new(JobId(1), "cmd arg1", &[pid(100)], JobState::Running);
        job.update(&WaitStatus::Stopped(pid(100), Signal::SIGTSTP));
        assert_eq!(job.state(), JobState::Stopped);

        job.update(&WaitStatus::Continued(pid(100)));
        assert_eq!(job.state(), JobState::Running);

        job.update(&WaitStatus::Stopped(pid(100), Signal::SIGSTOP));
        job.mark_continued();
        assert_eq!(job.state(), JobState::Running);
        assert!(!job.notified());
    }

    #[test]
    fn test_job_is_completed() {
        let mut job = Job::new(JobId(1), "cmd arg1", &[pid(100)], JobState::Running);
        job.update(&WaitStatus::Exited(pid(100), 0));
        assert_eq!(job.state(), JobState::Done(0));
        assert!(job.live_pids().is_empty());
        assert_eq!(job.to_string(), "[1] Done\tcmd arg1");
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = Job::new(JobId(2), "sleep 10", &[pid(100)], JobState::Running);
        job.update(&WaitStatus::Signaled(pid(100), Signal::SIGKILL, false));
        assert_eq!(job.state(), JobState::Terminated(Signal::SIGKILL));

        job.update(&WaitStatus::Exited(pid(100), 3));
        job.mark_continued();
        assert_eq!(job.state(), JobState::Terminated(Signal::SIGKILL));
        assert_eq!(job.to_string(), "[2] Terminated\tsleep 10");
    }

    #[test]
    fn test_notified_at_most_once() {
        let mut job = Job::new(JobId(1), "false", &[pid(100)], JobState::Running);
        assert!(!job.mark_notified());

        job.update(&WaitStatus::Exited(pid(100), 1));
        assert_eq!(job.to_string(), "[1] Exit 1\tfalse");
        assert!(job.mark_notified());
        assert!(!job.mark_notified());
        assert!(job.notified());
    }

    #[test]
    fn test_pipeline_job_reports_last_process() {
        let mut job = Job::new(
            JobId(3),
            "yes | head",
            &[pid(100), pid(101)],
            JobState::Stopped,
        );
        job.update(&WaitStatus::Exited(pid(101), 0));
        assert_eq!(job.state(), JobState::Stopped);
        assert_eq!(job.live_pids(), vec![pid(100)]);

        job.update(&WaitStatus::Signaled(pid(100), Signal::SIGPIPE, false));
        assert_eq!(job.state(), JobState::Done(0));
    }

    #[test]
    fn test_unknown_process_is_ignored() {
        let mut job = Job::new(JobId(1), "cmd", &[pid(100)], JobState::Running);
        job.update(&WaitStatus::Exited(pid(999), 0));
        assert_eq!(job.state(), JobState::Running);
        assert_eq!(job.live_pids(), vec![pid(100)]);
    }
}
