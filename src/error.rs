use thiserror::Error;

use crate::handle::Handle;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Resource allocation failed:\n{0}")]
    Allocation(#[from] anyhow::Error),

    #[error("Parent {0} is not a live handle")]
    StaleParent(Handle),

    #[error("Handle {0} is not live")]
    StaleHandle(Handle),

    #[error("Handle {0} is already bound to a slot")]
    AlreadyBound(Handle),
}
