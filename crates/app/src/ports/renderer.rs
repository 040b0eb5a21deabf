//! Display renderer port — where a display shows what it received.

use smartpark_domain::error::SmartParkError;
use smartpark_domain::snapshot::Snapshot;

/// Shows occupancy snapshots on some surface (console, file, screen).
pub trait DisplayRenderer: Send {
    /// Show one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SmartParkError::Sink`] when the surface cannot be written.
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), SmartParkError>;

    /// Release the rendering surface. Called once when the display quits.
    ///
    /// # Errors
    ///
    /// Returns [`SmartParkError::Sink`] when flushing the surface fails.
    fn teardown(&mut self) -> Result<(), SmartParkError> {
        Ok(())
    }
}
