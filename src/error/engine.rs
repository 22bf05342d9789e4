use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// A value whose type defines no hash function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("unhashable type: '{type_name}'")]
    Unhashable { type_name: &'static str },
}

/// Failures of the table algorithms themselves. All of them are
/// deterministic: retrying an operation can never change the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Hash(#[from] HashError),

    /// A probe loop reached an EMPTY slot without finding the key.
    #[error("KeyError")]
    KeyNotFound,

    /// No EMPTY slot left to claim; the simple table leaves resizing to
    /// its caller, so a full table is the caller's bug to surface.
    #[error("no empty slot left in table of size {size}")]
    TableFull { size: usize },

    /// The requested probing recurrence only covers every slot when the
    /// slot count is a power of two.
    #[error("probing recurrence '{algorithm}' does not cover {slot_count} slots")]
    NonCoveringProbe {
        algorithm: &'static str,
        slot_count: usize,
    },
}
