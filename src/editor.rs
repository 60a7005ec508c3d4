use std::fmt;

use rustyline::{self, error::ReadlineError};

use crate::errors::Result;

/// Line acquisition for the main loop.
pub struct Editor {
    internal: rustyline::Editor<()>,
}

impl Editor {
    pub fn new() -> Result<Editor> {
        let internal = rustyline::Editor::<()>::new()?;
        Ok(Editor { internal })
    }

    /// Returns `None` when end of file is reached. Ctrl-C at the prompt
    /// discards the line.
    pub fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.internal.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Editor")
    }
}
