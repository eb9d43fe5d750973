use std::fmt::Write;

use serde::Serialize;

use crate::factory::ResourceFactory;
use crate::registry::Registry;

/// One node as seen by [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub epoch: u64,
    pub slot: usize,
    /// Epoch of the left parent, if it is still stored.
    pub left: Option<u64>,
    /// Epoch of the right parent, if it is still stored.
    pub right: Option<u64>,
    pub destroyed: bool,
    /// Held by a slot, see [`Registry::assign`].
    pub bound: bool,
}

/// A point-in-time copy of the registry bookkeeping, in registration order.
///
/// Meant for debugging leaks across the bridge boundary: dump it as JSON
/// before and after a foreign call and compare.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn live(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.destroyed).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<F: ResourceFactory> Registry<F> {
    pub fn snapshot(&self) -> Snapshot {
        let entries = self
            .handles()
            .into_iter()
            .filter_map(|handle| self.lookup(handle))
            .map(|node| SnapshotEntry {
                epoch: node.handle().epoch(),
                slot: node.handle().slot(),
                left: node.left().map(|h| h.epoch()),
                right: node.right().map(|h| h.epoch()),
                destroyed: node.is_destroyed(),
                bound: node.is_bound(),
            })
            .collect();

        Snapshot { entries }
    }

    /// Renders the dependency forest as a Mermaid diagram.
    ///
    /// * **Green**: live
    /// * **Blue**: bound to a slot
    /// * **Grey**: destroyed, waiting for compaction
    pub fn render_mermaid(&self) -> String {
        let mut f = String::new();
        let _ = writeln!(f, "graph LR");

        let snapshot = self.snapshot();
        for entry in &snapshot.entries {
            let (status, color) = if entry.destroyed {
                ("destroyed", "#D3D3D3")
            } else if entry.bound {
                ("bound", "#ADD8E6")
            } else {
                ("live", "#90EE90")
            };
            let _ = writeln!(f, "    {}[\"#{}@{}\\n{}\"]", entry.epoch, entry.epoch, entry.slot, status);
            let _ = writeln!(f, "    style {} fill:{}", entry.epoch, color);
        }

        for entry in &snapshot.entries {
            if let Some(left) = entry.left {
                let _ = writeln!(f, "    {} -- L --> {}", left, entry.epoch);
            }
            if let Some(right) = entry.right {
                let _ = writeln!(f, "    {} -- R --> {}", right, entry.epoch);
            }
        }

        f
    }
}
