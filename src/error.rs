//! Error types for relation pointer access.

/// The error type for failed relation pointer dereferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationError {
    /// The handle's target node has been collected, or the handle was never
    /// bound to a live node.
    NullDereference,
    /// The owning forest context has been dropped; no node backing this
    /// handle can still exist.
    ContextReleased,
}

impl core::fmt::Display for RelationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NullDereference => f.write_str("dereference of a null relation pointer"),
            Self::ContextReleased => f.write_str("owning forest context has been released"),
        }
    }
}

impl std::error::Error for RelationError {}
