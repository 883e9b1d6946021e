//! Error kinds for builder operations.

use core::fmt;

/// Failure modes of builder operations.
///
/// The first two variants are structural-integrity failures: they indicate a
/// mutation that would have corrupted an enumeration or aliased a builder's
/// own storage. They always surface to the caller and never leave slot
/// bookkeeping inconsistent; the failed call leaves observable contents
/// unchanged. The remaining variants are ordinary bounds/lookup failures that
/// callers recover from locally.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CollectionError {
    /// A structural mutation was attempted while an enumeration over the same
    /// builder is active, or a callback re-entered the builder mid-operation.
    ConcurrentMutation,
    /// A bulk copy's source resolves to the destination's own backing storage.
    SelfReferentialMutation,
    /// The requested key is not present.
    KeyNotFound,
    /// The requested index is outside the occupied range.
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::ConcurrentMutation => {
                f.write_str("builder mutated while an enumeration over it is active")
            }
            CollectionError::SelfReferentialMutation => {
                f.write_str("bulk-copy source is the destination's own backing storage")
            }
            CollectionError::KeyNotFound => f.write_str("key not found"),
            CollectionError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
        }
    }
}

impl std::error::Error for CollectionError {}
