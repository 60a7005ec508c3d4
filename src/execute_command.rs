//! Spawns external commands.
//!
//! Redirect files and pipe ends are handed to the children through
//! `process::Stdio`, so all descriptor rewiring happens in the child between
//! `fork` and `exec`. The shell's own stdin and stdout are never touched.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::process::{self, Child, Stdio};

use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};

use crate::core::job::JobState;
use crate::core::parser::{Command, Operator};
use crate::errors::{Error, ErrorKind, Result, ResultExt};
use crate::shell::{signal_bridge, Shell};

/// Permissions of files created by `>`, before the umask.
const OUTPUT_FILE_MODE: u32 = 0o660;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Block until the command exits or is stopped
    Foreground,
    /// Track the command as a job and return immediately
    Background,
}

/// Runs `command` as an external program (or a two-stage pipeline).
///
/// In the background the job is announced on `stdout` as `[<slot>] <pid>`.
/// A foreground command that exits prints nothing.
pub fn execute(shell: &mut Shell, command: &Command, mode: Mode, stdout: &mut dyn Write) -> Result<()> {
    if command.has_pipe() && mode == Mode::Background {
        return Err(ErrorKind::UnsupportedPipeline.into());
    }

    let stdin_file = open_input(command)?;
    let stdout_file = open_output(command)?;
    let own_group = mode == Mode::Background;

    let children = if let Some(right_argv) = command.pipe_argv() {
        spawn_pipeline(command, command.argv(), right_argv, stdin_file, stdout_file)?
    } else {
        let child = spawn_process(
            command,
            command.argv(),
            stdin_file.map_or_else(Stdio::inherit, Stdio::from),
            stdout_file.map_or_else(Stdio::inherit, Stdio::from),
            own_group,
        )?;
        vec![child]
    };
    let pids: Vec<Pid> = children.iter().map(|c| Pid::from_raw(c.id() as libc::pid_t)).collect();

    match mode {
        Mode::Foreground => run_in_foreground(shell, command, &pids),
        Mode::Background => {
            let pid = pids[0];
            // The child does this too; whichever runs first wins the race
            // with exec.
            let temp_result = unistd::setpgid(pid, pid);
            log_if_err!(temp_result, "failed to set pgid for pid ({})", pid);

            let job_id = shell
                .job_table_mut()
                .add(command.display_text(), &pids, JobState::Running);
            info!("started job [{}] ({}): {}", job_id, pid, command.display_text());
            writeln!(stdout, "[{}] {}", job_id, pid)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn run_in_foreground(shell: &mut Shell, command: &Command, pids: &[Pid]) -> Result<()> {
    shell.foreground_mut().set(pids, command);
    let result = wait_for_foreground(pids);
    let stopped = match result {
        Ok(ref stopped) => stopped.clone(),
        Err(_) => Vec::new(),
    };

    // A stop the handler never saw (e.g. SIGSTOP from elsewhere) still has to
    // reach the job table.
    if let Some(&pid) = stopped.first() {
        signal_bridge::record_suspension(pid);
    }
    shell.foreground_mut().clear(stopped);
    result.map(|_| ())
}

/// Waits for every process to exit or stop. Returns the stopped ones.
fn wait_for_foreground(pids: &[Pid]) -> Result<Vec<Pid>> {
    let mut stopped = Vec::new();
    for &pid in pids {
        loop {
            match wait::waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Stopped(_, signal)) => {
                    debug!("{} was signaled to stop {:?}.", pid, signal);
                    stopped.push(pid);
                    break;
                }
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!("{} exited with {}.", pid, code);
                    break;
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    debug!("{} terminated by signal {:?}.", pid, signal);
                    break;
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(stopped)
}

fn spawn_pipeline(
    command: &Command,
    left_argv: &[String],
    right_argv: &[String],
    stdin_file: Option<File>,
    stdout_file: Option<File>,
) -> Result<Vec<Child>> {
    let mut left = spawn_process(
        command,
        left_argv,
        stdin_file.map_or_else(Stdio::inherit, Stdio::from),
        Stdio::piped(),
        false,
    )?;

    // Only the children hold the pipe: the write end lives in `left`, and the
    // read end is closed in the shell once `right` has been spawned.
    let read_end = match left.stdout.take() {
        Some(read_end) => read_end,
        None => {
            abandon(&mut left);
            return Err(ErrorKind::Spawn(left_argv[0].clone()).into());
        }
    };
    let right = spawn_process(
        command,
        right_argv,
        Stdio::from(read_end),
        stdout_file.map_or_else(Stdio::inherit, Stdio::from),
        false,
    );
    match right {
        Ok(right) => Ok(vec![left, right]),
        Err(e) => {
            abandon(&mut left);
            Err(e)
        }
    }
}

/// Kills and reaps a child whose partner failed to start.
fn abandon(child: &mut Child) {
    let temp_result = child.kill();
    log_if_err!(temp_result, "failed to kill {}", child.id());
    let temp_result = child.wait();
    log_if_err!(temp_result, "failed to reap {}", child.id());
}

fn spawn_process(
    command: &Command,
    argv: &[String],
    stdin: Stdio,
    stdout: Stdio,
    own_group: bool,
) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ErrorKind::Syntax(command.input.trim().to_string()))?;

    let mut child_command = process::Command::new(program);
    child_command.args(args).stdin(stdin).stdout(stdout);
    if own_group {
        // Runs in the child between fork and exec: setpgid is
        // async-signal-safe and allocation-free.
        unsafe {
            child_command.pre_exec(|| {
                let pid = unistd::getpid();
                unistd::setpgid(pid, pid).map_err(io::Error::from)
            });
        }
    }

    let child = child_command.spawn().map_err(|e| spawn_error(program, e))?;
    debug!("spawned {} as {}", program, child.id());
    Ok(child)
}

/// Failures to exec the program image surface from `spawn` with the exec
/// errno; anything else means the process itself could not be created.
fn spawn_error(program: &str, e: io::Error) -> Error {
    match e.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::EACCES) | Some(libc::ENOEXEC) | Some(libc::ENOTDIR) => {
            Error::with_chain(e, ErrorKind::Exec(program.to_string()))
        }
        _ => Error::with_chain(e, ErrorKind::Spawn(program.to_string())),
    }
}

fn open_input(command: &Command) -> Result<Option<File>> {
    if command.operator(Operator::RedirectIn).is_none() {
        return Ok(None);
    }

    let path = command
        .input_file()
        .ok_or_else(|| ErrorKind::Redirect(Operator::RedirectIn.to_string()))?;
    let file = File::open(path).chain_err(|| ErrorKind::Redirect(path.to_string()))?;
    Ok(Some(file))
}

fn open_output(command: &Command) -> Result<Option<File>> {
    if command.operator(Operator::RedirectOut).is_none() {
        return Ok(None);
    }

    let path = command
        .output_file()
        .ok_or_else(|| ErrorKind::Redirect(Operator::RedirectOut.to_string()))?;
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_FILE_MODE)
        .open(path)
        .chain_err(|| ErrorKind::Redirect(path.to_string()))?;
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};

    use nix::sys::signal::{self, Signal};
    use tempdir::TempDir;

    use super::*;
    use crate::shell::{builtins, ShellConfig};

    fn run(shell: &mut Shell, input: &str, mode: Mode) -> Result<String> {
        let mut out = Vec::new();
        execute(shell, &Command::parse(input), mode, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn new_shell() -> Shell {
        Shell::new(ShellConfig::noninteractive()).unwrap()
    }

    /// Runs the per-prompt bookkeeping until `done` holds, collecting what it
    /// prints.
    fn reconcile_until<F>(shell: &mut Shell, out: &mut Vec<u8>, done: F)
    where
        F: Fn(&Shell) -> bool,
    {
        for _ in 0..250 {
            shell.reconcile_jobs(out);
            if done(shell) {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("job table never reached the expected state: {:?}", shell);
    }

    fn first_job_state(shell: &Shell) -> Option<JobState> {
        shell.job_table().jobs().first().map(|job| job.state())
    }

    #[test]
    fn test_foreground_blocks_until_exit() {
        let _guard = signal_bridge::test_lock();
        let mut shell = new_shell();

        let start = Instant::now();
        let out = run(&mut shell, "sleep 0.2", Mode::Foreground).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(out.is_empty());
        assert_eq!(shell.foreground().pid(), None);
        assert!(shell.foreground_mut().take_suspended().is_none());
        assert!(shell.job_table().is_empty());
    }

    #[test]
    fn test_redirects() {
        let _guard = signal_bridge::test_lock();
        let mut shell = new_shell();
        let dir = TempDir::new("bsh").unwrap();
        let out_path = dir.path().join("out.txt");
        let copy_path = dir.path().join("copy.txt");

        let input = format!("echo hello world > {}", out_path.display());
        run(&mut shell, &input, Mode::Foreground).unwrap();
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "hello world\n");

        let input = format!("cat < {} > {}", out_path.display(), copy_path.display());
        run(&mut shell, &input, Mode::Foreground).unwrap();
        assert_eq!(fs::read_to_string(&copy_path).unwrap(), "hello world\n");
    }

    #[test]
    fn test_output_redirect_truncates() {
        let _guard = signal_bridge::test_lock();
        let mut shell = new_shell();
        let dir = TempDir::new("bsh").unwrap();
        let out_path = dir.path().join("out.txt");
        fs::write(&out_path, "a much longer line than the next one\n").unwrap();

        let input = format!("echo short > {}", out_path.display());
        run(&mut shell, &input, Mode::Foreground).unwrap();
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "short\n");
    }

    #[test]
    fn test_missing_input_file_is_redirect_error() {
        let mut shell = new_shell();
        let dir = TempDir::new("bsh").unwrap();
        let input = format!("cat < {}", dir.path().join("missing.txt").display());

        let err = run(&mut shell, &input, Mode::Background).unwrap_err();
        match *err.kind() {
            ErrorKind::Redirect(ref path) => assert!(path.ends_with("missing.txt")),
            ref other => panic!("unexpected error: {}", other),
        }
        assert!(shell.job_table().is_empty());
    }

    #[test]
    fn test_missing_redirect_target() {
        let mut shell = new_shell();
        match *run(&mut shell, "cat <", Mode::Foreground).unwrap_err().kind() {
            ErrorKind::Redirect(ref target) => assert_eq!(target, "<"),
            ref other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_program_is_exec_error() {
        let mut shell = new_shell();
        let err = run(&mut shell, "bsh-no-such-program --flag", Mode::Foreground).unwrap_err();
        match *err.kind() {
            ErrorKind::Exec(ref program) => assert_eq!(program, "bsh-no-such-program"),
            ref other => panic!("unexpected error: {}", other),
        }
        assert_eq!(shell.foreground().pid(), None);
    }

    #[test]
    fn test_missing_program_is_syntax_error() {
        let mut shell = new_shell();
        match *run(&mut shell, "| wc -c", Mode::Foreground).unwrap_err().kind() {
            ErrorKind::Syntax(_) => (),
            ref other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_pipeline_stays_between_children() {
        let _guard = signal_bridge::test_lock();
        let mut shell = new_shell();
        let dir = TempDir::new("bsh").unwrap();
        let out_path = dir.path().join("count.txt");

        let input = format!("echo hi | wc -c > {}", out_path.display());
        let out = run(&mut shell, &input, Mode::Foreground).unwrap();
        assert!(out.is_empty());
        assert_eq!(fs::read_to_string(&out_path).unwrap().trim(), "3");

        let after_path = dir.path().join("after.txt");
        let input = format!("echo after > {}", after_path.display());
        run(&mut shell, &input, Mode::Foreground).unwrap();
        assert_eq!(fs::read_to_string(&after_path).unwrap(), "after\n");
    }

    #[test]
    fn test_pipeline_in_background_is_rejected() {
        let mut shell = new_shell();
        let mut out = Vec::new();
        let command = Command::parse("yes | head -n 1 &");
        match *execute(&mut shell, &command, Mode::Background, &mut out)
            .unwrap_err()
            .kind()
        {
            ErrorKind::UnsupportedPipeline => (),
            ref other => panic!("unexpected error: {}", other),
        }
        assert!(out.is_empty());
        assert!(shell.job_table().is_empty());
    }

    #[test]
    fn test_background_job_is_tracked() {
        let mut shell = new_shell();
        let out = run(&mut shell, "sleep 10 &", Mode::Background).unwrap();

        assert_eq!(shell.job_table().len(), 1);
        let job = &shell.job_table().jobs()[0];
        let pid = job.pid();
        assert_eq!(out, format!("[1] {}\n", pid));
        assert_eq!(job.state(), JobState::Running);
        assert_eq!(job.input(), "sleep 10");
        assert_eq!(unistd::getpgid(Some(pid)).unwrap(), pid);

        signal::kill(pid, Signal::SIGKILL).unwrap();
        wait::waitpid(pid, None).unwrap();
    }

    #[test]
    fn test_ctrl_z_suspends_foreground_command() {
        let _guard = signal_bridge::test_lock();
        signal_bridge::take_pending_suspension();
        let mut shell = new_shell();

        // Plays the terminal: once the shell is blocked on `sleep`, deliver
        // Ctrl-Z to the shell itself.
        let ctrl_z = thread::spawn(|| {
            for _ in 0..250 {
                if signal_bridge::foreground_pid().is_some() {
                    signal::kill(Pid::this(), Signal::SIGTSTP).unwrap();
                    return;
                }
                thread::sleep(Duration::from_millis(20));
            }
            panic!("foreground command never started");
        });

        let start = Instant::now();
        let out = run(&mut shell, "sleep 5", Mode::Foreground).unwrap();
        ctrl_z.join().unwrap();
        assert!(out.is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(shell.foreground().pid(), None);

        let mut out = Vec::new();
        shell.reconcile_jobs(&mut out);
        assert!(out.is_empty());
        assert_eq!(shell.job_table().len(), 1);
        let job = &shell.job_table().jobs()[0];
        assert_eq!(job.state(), JobState::Stopped);
        assert_eq!(job.input(), "sleep 5");
        let pid = job.pid();

        builtins::run(&mut shell, "bg", &["1"], &mut out).unwrap();
        assert_eq!(first_job_state(&shell), Some(JobState::Running));

        signal::kill(pid, Signal::SIGKILL).unwrap();
        reconcile_until(&mut shell, &mut out, |shell| shell.job_table().is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "[1] Terminated\tsleep 5\n");
    }

    #[test]
    fn test_background_job_stops_and_resumes() {
        let _guard = signal_bridge::test_lock();
        let mut shell = new_shell();
        run(&mut shell, "sleep 5 &", Mode::Background).unwrap();
        let pid = shell.job_table().jobs()[0].pid();

        let mut out = Vec::new();
        signal::kill(pid, Signal::SIGTSTP).unwrap();
        reconcile_until(&mut shell, &mut out, |shell| {
            first_job_state(shell) == Some(JobState::Stopped)
        });

        builtins::run(&mut shell, "bg", &["1"], &mut out).unwrap();
        assert_eq!(first_job_state(&shell), Some(JobState::Running));
        reconcile_until(&mut shell, &mut out, |shell| {
            first_job_state(shell) == Some(JobState::Running)
        });
        assert!(out.is_empty());

        signal::kill(pid, Signal::SIGKILL).unwrap();
        reconcile_until(&mut shell, &mut out, |shell| shell.job_table().is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "[1] Terminated\tsleep 5\n");
    }
}
