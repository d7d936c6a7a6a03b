use crate::interrupt::Interrupt;
use std::path::PathBuf;

/// Context passed throughout the application containing global configuration
#[derive(Clone)]
pub struct Context {
    /// Enable verbose output (show every copied and archived entry)
    pub verbose: bool,

    /// Root of the project being packaged, never written to except for output
    pub project_root: PathBuf,

    /// Raised by Ctrl+C; long-running steps stop at the next entry
    pub interrupt: Interrupt,
}

impl Context {
    pub fn new(project_root: PathBuf, verbose: bool) -> Self {
        Self {
            verbose,
            project_root,
            interrupt: Interrupt::default(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }
}
