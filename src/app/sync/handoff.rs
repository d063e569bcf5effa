//! Hand-off to the updated application

use crate::errors::LaunchResult;

/// Starts the installed application once a run has completed
pub trait Handoff: Send + Sync {
    /// Whether an installed application is present to fall back on
    fn installed(&self) -> bool;

    /// Start the application
    fn hand_off(&self) -> LaunchResult<()>;
}

/// Starts nothing and reports no installation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandoff;

impl Handoff for NoHandoff {
    fn installed(&self) -> bool {
        false
    }

    fn hand_off(&self) -> LaunchResult<()> {
        Ok(())
    }
}
