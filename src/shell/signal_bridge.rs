//! Bridges `SIGTSTP` (Ctrl-Z) to the job table.
//!
//! The handler runs in signal context, so it only touches the fixed-size
//! atomics below: it forwards the signal to the foreground processes and
//! raises a flag. The shell's main loop takes the flag on its next iteration
//! and adds the stopped job to the `JobTable` there.
//!
//! If Ctrl-Z arrives just as the foreground process exits on its own, which
//! one is reported is unspecified.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

use crate::core::parser::Command;
use crate::errors::Result;

/// A single pipe stage means at most two foreground processes.
const MAX_FOREGROUND_PROCESSES: usize = 2;

static FOREGROUND_PIDS: [AtomicI32; MAX_FOREGROUND_PROCESSES] = [AtomicI32::new(0), AtomicI32::new(0)];
static SUSPEND_PENDING: AtomicBool = AtomicBool::new(false);
static SUSPENDED_PID: AtomicI32 = AtomicI32::new(0);

/// Installs the `SIGTSTP` handler for the shell process.
pub fn install() -> Result<()> {
    arm()?;
    debug!("installed SIGTSTP handler");
    Ok(())
}

fn arm() -> nix::Result<SigAction> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigtstp),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // handle_sigtstp only touches atomics and calls async-signal-safe
    // functions (sigaction, kill).
    unsafe { signal::sigaction(Signal::SIGTSTP, &action) }
}

extern "C" fn handle_sigtstp(_signal: libc::c_int) {
    // The interrupted code may be about to read errno.
    let saved_errno = unsafe { *errno_location() };
    forward_sigtstp();
    set_errno(saved_errno);
}

fn forward_sigtstp() {
    let _ = arm();

    let first = FOREGROUND_PIDS[0].load(Ordering::SeqCst);
    if first <= 0 {
        return;
    }

    for slot in &FOREGROUND_PIDS {
        let pid = slot.load(Ordering::SeqCst);
        if pid > 0 {
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTSTP);
        }
    }
    record_suspension(Pid::from_raw(first));
}

fn set_errno(value: libc::c_int) {
    unsafe {
        *errno_location() = value;
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "dragonfly"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno()
}

/// Flags `pid` as suspended for the main loop to pick up. Safe to call from
/// signal context.
pub fn record_suspension(pid: Pid) {
    SUSPENDED_PID.store(pid.as_raw(), Ordering::SeqCst);
    SUSPEND_PENDING.store(true, Ordering::SeqCst);
}

/// Clears the pending flag, returning the pid it was raised for.
pub fn take_pending_suspension() -> Option<Pid> {
    if SUSPEND_PENDING.swap(false, Ordering::SeqCst) {
        Some(Pid::from_raw(SUSPENDED_PID.load(Ordering::SeqCst)))
    } else {
        None
    }
}

/// The first process of the command the shell is blocked on, if any.
pub fn foreground_pid() -> Option<Pid> {
    match FOREGROUND_PIDS[0].load(Ordering::SeqCst) {
        pid if pid > 0 => Some(Pid::from_raw(pid)),
        _ => None,
    }
}

/// Tracks the foreground process the shell is blocked on.
///
/// The pids live in statics so the signal handler can read them; the command
/// stays on the main path and is used to name the job if the process stops.
#[derive(Debug, Default)]
pub struct ForegroundTracker {
    command: Option<Command>,
    suspended: Option<(Command, Vec<Pid>)>,
}

impl ForegroundTracker {
    pub fn set(&mut self, pids: &[Pid], command: &Command) {
        debug_assert!(pids.len() <= MAX_FOREGROUND_PROCESSES);
        for (i, slot) in FOREGROUND_PIDS.iter().enumerate() {
            let raw = pids.get(i).map_or(0, |pid| pid.as_raw());
            slot.store(raw, Ordering::SeqCst);
        }
        self.command = Some(command.clone());
    }

    /// Called once the foreground wait returns. `stopped` lists the processes
    /// that were stopped rather than reaped; they are kept until the main loop
    /// turns them into a job.
    pub fn clear(&mut self, stopped: Vec<Pid>) {
        for slot in &FOREGROUND_PIDS {
            slot.store(0, Ordering::SeqCst);
        }

        let command = self.command.take();
        self.suspended = match command {
            Some(command) if !stopped.is_empty() => Some((command, stopped)),
            _ => None,
        };
    }

    pub fn pid(&self) -> Option<Pid> {
        foreground_pid()
    }

    pub fn take_suspended(&mut self) -> Option<(Command, Vec<Pid>)> {
        self.suspended.take()
    }
}

/// Serializes tests that touch the process-wide foreground state.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::Mutex;

    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
