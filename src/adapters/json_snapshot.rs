//! JSON snapshot adapter: versioned serialization of a runner snapshot.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::error::SwingtraderError;
use crate::domain::runner::{RunnerSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::ports::snapshot::SnapshotPort;

pub struct JsonSnapshotAdapter;

/// Minimal probe so incompatible files are rejected on the version field
/// alone, before the full schema is decoded.
#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl SnapshotPort for JsonSnapshotAdapter {
    fn save(&self, snapshot: &RunnerSnapshot, path: &Path) -> Result<(), SwingtraderError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<RunnerSnapshot, SwingtraderError> {
        let content = fs::read_to_string(path).map_err(|e| SwingtraderError::Snapshot {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let probe: VersionProbe =
            serde_json::from_str(&content).map_err(|e| SwingtraderError::Snapshot {
                reason: format!("not a snapshot file: {e}"),
            })?;
        if probe.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SwingtraderError::SnapshotVersion {
                found: probe.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(&content)?)
    }
}
