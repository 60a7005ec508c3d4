pub use self::job_control::JobTable;
pub use self::shell::Shell;
pub use self::signal_bridge::ForegroundTracker;

pub mod builtins;
pub mod job_control;
#[allow(clippy::module_inception)]
pub mod shell;
pub mod signal_bridge;

const DEFAULT_PROMPT: &str = "bsh> ";

/// Policy object to control a Shell's behavior
#[derive(Debug, Copy, Clone)]
pub struct ShellConfig {
    /// Determines if some messages (e.g. "exit") should be displayed.
    display_messages: bool,

    /// Text shown before reading each line.
    prompt: &'static str,
}

impl ShellConfig {
    /// Creates an interactive shell
    ///
    /// # Complete List
    /// - The prompt is displayed
    /// - "exit" is printed when input ends
    pub fn interactive() -> Self {
        Self {
            display_messages: true,
            prompt: DEFAULT_PROMPT,
        }
    }

    /// Creates a noninteractive shell, e.g. for tests
    ///
    /// # Complete List
    /// - No prompt
    /// - Fewer messages are displayed
    pub fn noninteractive() -> Self {
        Default::default()
    }

    pub fn display_messages(&self) -> bool {
        self.display_messages
    }

    pub fn prompt(&self) -> &'static str {
        self.prompt
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            display_messages: false,
            prompt: "",
        }
    }
}
