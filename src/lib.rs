//! Bsh - Bob Shell
//!
//! A small interactive shell: external commands, `<`/`>` redirection, a single
//! `|` stage, and job control (`&`, Ctrl-Z, `jobs`, `bg`).

#![deny(missing_debug_implementations, unused_import_braces)]

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

/// Logs the error of a `Result` without propagating it.
macro_rules! log_if_err {
    ($result:expr) => {
        if let Err(e) = $result {
            error!("{}", e);
        }
    };
    ($result:expr, $fmt:expr) => {
        if let Err(e) = $result {
            error!(concat!($fmt, ": {}"), e);
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        if let Err(e) = $result {
            error!(concat!($fmt, ": {}"), $($arg)*, e);
        }
    };
}

pub mod core;
pub mod editor;
pub mod errors;
pub mod execute_command;
pub mod shell;

pub use crate::shell::{Shell, ShellConfig};
