use std::fmt::{Debug, Display};

use petgraph::graph::NodeIndex;

/// An opaque reference to one resource held by a [`Registry`](crate::Registry).
///
/// A handle names a single registration. It pairs the arena slot that stores
/// the node with the epoch stamped when the resource was registered. Slots
/// are recycled once compaction removes a destroyed node, epochs never are, so
/// an old handle can't accidentally resolve to whatever now lives in its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub(crate) epoch: u64,
    pub(crate) index: NodeIndex,
}

impl Handle {
    pub(crate) fn new(index: NodeIndex, epoch: u64) -> Self {
        Self { epoch, index }
    }

    /// Position of the node in the registry arena.
    pub fn slot(&self) -> usize {
        self.index.index()
    }

    /// Registration counter value. Handles from the same registry order by
    /// epoch in the order they were registered.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.epoch, self.index.index())
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_epoch() {
        let a = Handle::new(NodeIndex::new(5), 1);
        let b = Handle::new(NodeIndex::new(0), 2);
        assert!(a < b);
    }

    #[test]
    fn test_same_slot_different_epoch() {
        let a = Handle::new(NodeIndex::new(3), 1);
        let b = Handle::new(NodeIndex::new(3), 7);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn test_display() {
        let h = Handle::new(NodeIndex::new(2), 9);
        assert_eq!(h.to_string(), "#9@2");
        assert_eq!(format!("{h:?}"), "Handle(#9@2)");
    }
}
