use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, globally-unique identity of a [`TransferElement`](crate) instance.
///
/// Minted once per concrete element at construction via [`TransferElementId::new`]. Decorator
/// wrappers re-use the id of their target (see `transfer-core`'s decorator modules) so that two
/// accessors obtained for the same underlying register compare equal. The default value is the
/// "uninitialised" sentinel, which compares equal to itself but never to a real id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TransferElementId(u64);

impl TransferElementId {
    /// Mints a fresh, never-before-used id.
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` if this id is the uninitialised sentinel.
    pub fn is_uninitialised(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique_and_initialised() {
        let a = TransferElementId::new();
        let b = TransferElementId::new();
        assert_ne!(a, b);
        assert!(!a.is_uninitialised());
    }

    #[test]
    fn default_ids_compare_equal_and_are_uninitialised() {
        let a = TransferElementId::default();
        let b = TransferElementId::default();
        assert_eq!(a, b);
        assert!(a.is_uninitialised());
        assert_ne!(a, TransferElementId::new());
    }
}
