extern crate bsh_jobs;
extern crate docopt;
extern crate fern;
#[macro_use]
extern crate log;
extern crate nix;
#[macro_use]
extern crate serde_derive;

use std::path::PathBuf;
use std::process;

use bsh_jobs::{Shell, ShellConfig};
use docopt::Docopt;
use nix::unistd::Pid;

const LOG_FILE_NAME: &str = ".bsh_log";

const USAGE: &str = "
bsh.

Usage:
    bsh [options]
    bsh (-h | --help)
    bsh --version

Options:
    -h --help       Show this screen.
    --version       Show version.
    --log=<path>    File to write log to, defaults to ~/.bsh_log
";

/// Docopts input arguments.
#[derive(Debug, Deserialize)]
struct Args {
    flag_version: bool,
    flag_log: Option<String>,
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if args.flag_version {
        println!("bsh version {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = init_logger(&args.flag_log) {
        eprintln!("bsh: unable to open log file: {}", e);
    }
    debug!("{:?}", args);

    let mut shell = Shell::new(ShellConfig::interactive()).unwrap_or_else(|e| {
        error!("failed to create shell: {}", e);
        eprintln!("bsh: {}", e);
        process::exit(1);
    });

    if let Err(e) = shell.execute_from_stdin() {
        error!("failed to read input: {}", e);
        eprintln!("bsh: {}", e);
    }

    // End of input is treated like `exit`.
    shell.exit()
}

fn init_logger(path: &Option<String>) -> Result<(), fern::InitError> {
    let log_path = path
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(default_log_path);

    let pid = Pid::this();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                pid,
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Trace)
        .chain(fern::log_file(log_path)?)
        .apply()?;
    Ok(())
}

fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(LOG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAME))
}
