use crate::factory::ResourceFactory;
use crate::registry::Registry;

/// When destroyed nodes are physically removed from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compaction {
    /// Sweep only when a slot value is replaced, i.e. on
    /// [`Registry::cleanup`] and [`Registry::assign`].
    #[default]
    OnCleanup,
    /// Also sweep after every [`Registry::destroy`] that freed something.
    Eager,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Options {
    pub compaction: Compaction,
    pub strict_parents: bool,
    pub capacity: usize,
}

/// A builder struct for creating a [`Registry`] with specified settings.
pub struct Config<F: ResourceFactory> {
    factory: F,
    options: Options,
}

impl<F: ResourceFactory> Config<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self {
            factory,
            options: Options::default(),
        }
    }

    pub fn compaction(mut self, compaction: Compaction) -> Self {
        self.options.compaction = compaction;
        self
    }

    /// Reject registrations naming a parent that is not live, instead of
    /// recording that parent as absent.
    pub fn strict_parents(mut self, strict: bool) -> Self {
        self.options.strict_parents = strict;
        self
    }

    /// Preallocate room for this many nodes.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.options.capacity = capacity;
        self
    }

    pub fn finish(self) -> Registry<F> {
        Registry::with_options(self.factory, self.options)
    }
}
