//! Snapshot persistence port trait.

use std::path::Path;

use crate::domain::error::SwingtraderError;
use crate::domain::runner::RunnerSnapshot;

/// Port for persisting and restoring a runner snapshot. The market data
/// provider is never part of a snapshot; it is rebuilt from the saved
/// configuration on load.
pub trait SnapshotPort {
    fn save(&self, snapshot: &RunnerSnapshot, path: &Path) -> Result<(), SwingtraderError>;

    fn load(&self, path: &Path) -> Result<RunnerSnapshot, SwingtraderError>;
}
