use crate::shell::builtins::{self, prelude::*};

#[derive(Debug)]
pub struct Exit;

impl builtins::BuiltinCommand for Exit {
    const NAME: &'static str = builtins::EXIT_NAME;

    const HELP: &'static str = "\
Usage: exit

Exit the shell with a status of 0. Background jobs keep running.";

    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], _stdout: &mut dyn Write) -> Result<()> {
        if !args.is_empty() {
            debug!("{}: ignoring {} arguments", Self::NAME, args.len());
        }
        shell.exit();
    }
}
