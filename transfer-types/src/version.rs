use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// A totally-ordered token stamped on every completed transfer.
///
/// Every successful write stamps its element with a freshly-minted version number; every
/// successful read copies the source's stamp. Ordering is by the monotonic sequence counter
/// alone; the construction timestamp is carried for diagnostics only and does not participate in
/// `Ord`.
#[derive(Debug, Clone, Copy, Eq)]
pub struct VersionNumber {
    seq: u64,
    created_at: u128,
}

impl VersionNumber {
    /// Mints the next version number in process-wide monotonic order.
    pub fn new() -> Self {
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self { seq, created_at }
    }

    /// The nanosecond timestamp at which this version number was minted.
    pub fn created_at_nanos(&self) -> u128 {
        self.created_at
    }
}

impl Default for VersionNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq.cmp(&other.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_monotonically_increasing() {
        let a = VersionNumber::new();
        let b = VersionNumber::new();
        assert!(b > a);
    }

    #[test]
    fn non_decreasing_across_repeated_reads() {
        let source = VersionNumber::new();
        let copy_a = source;
        let copy_b = source;
        assert!(copy_b >= copy_a);
    }
}
