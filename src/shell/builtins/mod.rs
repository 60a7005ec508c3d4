//! Bsh builtins
//!
//! `exit`, `jobs` and `bg`. Every other program name is run by the executor.

use std::iter;

use docopt::Docopt;
use serde::de::DeserializeOwned;

use self::prelude::*;

use self::exit::Exit;
use self::jobs::{Bg, Jobs};

pub mod prelude {
    pub use std::io::Write;

    pub use super::parse_args;
    pub use crate::errors::{Error, ErrorKind, Result};
    pub use crate::shell::Shell;
}

mod exit;
mod jobs;

const BG_NAME: &str = "bg";
const EXIT_NAME: &str = "exit";
const JOBS_NAME: &str = "jobs";

/// Represents a Bsh builtin command such as jobs or bg.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// The help string to display to the user.
    const HELP: &'static str;
    /// Runs the command with the given arguments in the `shell` environment.
    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], stdout: &mut dyn Write) -> Result<()>;
}

pub fn is_builtin<T: AsRef<str>>(program: T) -> bool {
    [BG_NAME, EXIT_NAME, JOBS_NAME].contains(&program.as_ref())
}

/// precondition: command is a builtin.
pub fn run<S1, S2>(shell: &mut Shell, program: S1, args: &[S2], stdout: &mut dyn Write) -> Result<()>
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    debug_assert!(is_builtin(&program));
    debug!("running builtin {}", program.as_ref());

    match program.as_ref() {
        BG_NAME => Bg::run(shell, args, stdout),
        EXIT_NAME => Exit::run(shell, args, stdout),
        JOBS_NAME => Jobs::run(shell, args, stdout),
        _ => unreachable!(),
    }
}

pub fn parse_args<D, S, I>(usage: &str, program: S, args: I) -> Result<D>
where
    D: DeserializeOwned,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args = Docopt::new(usage)?
        .argv(iter::once(program).chain(args))
        .deserialize()?;
    Ok(args)
}
