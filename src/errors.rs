//! Error module. See the [error-chain](https://crates.io/crates/error-chain) crate for details.
//!
//! Every error is local to the command that produced it: the shell reports it
//! and moves on to the next prompt.

error_chain! {
    foreign_links {
        Docopt(::docopt::Error);
        Io(::std::io::Error);
        Nix(::nix::Error);
        Readline(::rustyline::error::ReadlineError);
    }

    errors {
        // A command line with an operator but no program to run, e.g. `| wc`
        Syntax(line: String) {
            description("syntax error")
            display("syntax error near: '{}'", line)
        }
        // The process could not be created
        Spawn(program: String) {
            description("failed to spawn process")
            display("{}: failed to spawn process", program)
        }
        // A redirect target was missing or could not be opened
        Redirect(target: String) {
            description("redirect failed")
            display("{}: redirect failed", target)
        }
        // The program image could not be executed
        Exec(program: String) {
            description("command not found")
            display("{}: command not found", program)
        }
        // `bg` was given a slot that names no tracked job
        InvalidSlot(slot: String) {
            description("no such job")
            display("bg: {}: no such job", slot)
        }
        // `bg` was given a job that has already exited
        JobFinished(slot: u32) {
            description("job has terminated")
            display("bg: job {} has already terminated", slot)
        }
        // A pipeline was combined with a background marker
        UnsupportedPipeline {
            description("pipelines cannot run in the background")
            display("pipelines cannot run in the background")
        }
    }
}
