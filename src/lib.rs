#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod diagnostics;
mod error;
mod factory;
mod handle;
mod parents;
mod registry;
mod shared;

pub use crate::config::{Compaction, Config};
pub use crate::diagnostics::{Snapshot, SnapshotEntry};
pub use crate::error::RegistryError;
pub use crate::factory::{Dropping, ResourceFactory};
pub use crate::handle::Handle;
pub use crate::parents::{Parent, Parents, Side};
pub use crate::registry::{NodeRef, Registry};
pub use crate::shared::SharedRegistry;

/// Installs a `tracing` subscriber that prints registry events to stderr.
///
/// The filter is read from `RUST_LOG` and defaults to `handle_lineage=info`.
/// Calling this more than once is harmless; only the first call installs.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handle_lineage=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
