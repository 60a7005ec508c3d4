use std::fmt;
use std::io::{self, Write};
use std::process;

use crate::core::job::JobState;
use crate::core::parser::Command;
use crate::editor::Editor;
use crate::errors::Result;
use crate::execute_command::{self, Mode};
use crate::shell::{builtins, signal_bridge, ForegroundTracker, JobTable, ShellConfig};

pub struct Shell {
    job_table: JobTable,
    foreground: ForegroundTracker,
    config: ShellConfig,
}

impl Shell {
    /// Constructs a new Shell and installs its `SIGTSTP` handler.
    pub fn new(config: ShellConfig) -> Result<Self> {
        signal_bridge::install()?;
        info!("bsh started up");
        Ok(Self {
            job_table: Default::default(),
            foreground: Default::default(),
            config,
        })
    }

    /// Runs a single input line. Blank lines do nothing.
    pub fn execute_command_string(&mut self, input: &str) -> Result<()> {
        let command = Command::parse(input);
        if command.is_empty() {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        match command.program() {
            Some(program) if builtins::is_builtin(program) => {
                let args = &command.argv()[1..];
                builtins::run(self, program, args, &mut stdout)
            }
            _ => {
                let mode = if command.is_background() {
                    Mode::Background
                } else {
                    Mode::Foreground
                };
                execute_command::execute(self, &command, mode, &mut stdout)
            }
        }
    }

    /// Reads and runs lines until input ends.
    pub fn execute_from_stdin(&mut self) -> Result<()> {
        let mut editor = Editor::new()?;
        loop {
            {
                let stdout = io::stdout();
                let mut stdout = stdout.lock();
                self.reconcile_jobs(&mut stdout);
                log_if_err!(stdout.flush(), "flush");
            }

            let input = match editor.readline(self.config.prompt()) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("prompt: {}", e);
                    eprintln!("bsh: {}", e);
                    break;
                }
            };

            if let Err(e) = self.execute_command_string(&input) {
                eprintln!("bsh: {}", e);
                warn!("{:?}: {}", input, e);
            }
        }

        if self.config.display_messages() {
            println!("exit");
        }
        Ok(())
    }

    /// Once-per-prompt bookkeeping: turn a Ctrl-Z'd foreground process into a
    /// stopped job, report finished background jobs, and sweep the table.
    pub fn reconcile_jobs(&mut self, out: &mut dyn Write) {
        if let Some(pid) = signal_bridge::take_pending_suspension() {
            match self.foreground.take_suspended() {
                Some((command, pids)) => {
                    let job_id =
                        self.job_table
                            .add(command.display_text(), &pids, JobState::Stopped);
                    info!("job [{}] ({}) stopped", job_id, pid);
                }
                None => debug!("{} exited before it could be suspended", pid),
            }
        }

        let temp_result = self.job_table.poll_all(out);
        log_if_err!(temp_result, "poll_all");
        self.job_table.sweep_if_all_notified();
    }

    /// Exits with status 0. Background jobs are left running.
    pub fn exit(&mut self) -> ! {
        if !self.job_table.is_empty() {
            info!("leaving {} jobs behind", self.job_table.len());
        }
        info!("bsh has shut down");
        process::exit(0);
    }

    pub fn job_table(&self) -> &JobTable {
        &self.job_table
    }

    pub fn job_table_mut(&mut self) -> &mut JobTable {
        &mut self.job_table
    }

    pub fn foreground(&self) -> &ForegroundTracker {
        &self.foreground
    }

    pub fn foreground_mut(&mut self) -> &mut ForegroundTracker {
        &mut self.foreground
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} jobs\n{:?}", self.job_table, self.foreground)
    }
}
