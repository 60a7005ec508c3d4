use crate::core::job::JobId;
use crate::shell::builtins::{self, prelude::*};

#[derive(Debug)]
pub struct Jobs;

#[derive(Debug, Deserialize)]
struct JobsArgs {
    flag_l: bool,
}

impl builtins::BuiltinCommand for Jobs {
    const NAME: &'static str = builtins::JOBS_NAME;

    const HELP: &'static str = "\
Usage: jobs [-l]

Display status of jobs.

Lists the active jobs. A finished job is listed once, then forgotten.

Options:
    -l      lists process IDs in addition to the normal information";

    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], stdout: &mut dyn Write) -> Result<()> {
        let args: JobsArgs = parse_args(Self::HELP, Self::NAME, args.iter().map(AsRef::as_ref))?;
        debug!("{:?}", args);

        shell.job_table_mut().list(stdout, args.flag_l)
    }
}

#[derive(Debug)]
pub struct Bg;

impl builtins::BuiltinCommand for Bg {
    const NAME: &'static str = builtins::BG_NAME;

    const HELP: &'static str = "\
Usage: bg <jobspec>

Resume a stopped job in the background.

Sends SIGCONT to the job whose number is JOBSPEC, as listed by `jobs'.

Exit Status:
Returns success unless JOBSPEC does not name a live job.";

    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], _stdout: &mut dyn Write) -> Result<()> {
        let arg = args
            .first()
            .map(AsRef::as_ref)
            .ok_or_else(|| ErrorKind::InvalidSlot("current".to_string()))?;
        let job_id = arg
            .parse::<u32>()
            .map(JobId)
            .map_err(|_| Error::from(ErrorKind::InvalidSlot(arg.to_string())))?;
        shell.job_table_mut().resume(job_id)
    }
}
