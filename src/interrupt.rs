use crate::error::Error;
use crate::result::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ctrl+C flag polled by the pipeline between entries
///
/// The handler only raises the flag; the copy and archive loops return
/// [`Error::Interrupted`] on their next entry so the staging and partial
/// archive guards unwind normally.
#[derive(Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Install the process-wide Ctrl+C / SIGTERM handler
    pub fn install() -> Result<Self> {
        let interrupt = Interrupt::default();
        let flag = interrupt.clone();
        ctrlc::set_handler(move || flag.trigger())?;
        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Interrupted`] once the flag is raised
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}
