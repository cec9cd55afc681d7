use thiserror::Error;

/// Crate-level error type. All failures are synchronous and local to the
/// call site; nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Element count passed to sizing was zero.
    #[error("element count must be greater than zero")]
    InvalidCount,

    /// No compatible GPU adapter was found on this machine.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// The adapter exists but cannot run texture-resident kernels. There is
    /// no CPU fallback path, so this is fatal at context creation.
    #[error("backend unsupported: {0}")]
    Unsupported(String),

    /// A field or constant with this name is already registered.
    #[error("name already registered: {0}")]
    AlreadyExists(String),

    /// No field or constant with this name exists in the registry, or a
    /// kernel input could not be resolved.
    #[error("no field or constant named {0}")]
    NotFound(String),

    /// The field or constant was disposed and its GPU resources released.
    #[error("{0} has been disposed")]
    Disposed(String),

    /// A blocking readback failed to map its staging buffer.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
