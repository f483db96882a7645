bitflags::bitflags! {
    /// The set of access-mode flags an accessor was opened with.
    ///
    /// `RAW` disables fixed-point conversion; `WAIT_FOR_NEW_DATA` enables blocking/async
    /// semantics on reads.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessModeFlags: u8 {
        /// Disables fixed-point conversion; the cooked buffer holds the raw device word.
        const RAW = 0b01;
        /// Enables `read_non_blocking`/`read_latest`/`read_async` semantics.
        const WAIT_FOR_NEW_DATA = 0b10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose() {
        let flags = AccessModeFlags::RAW | AccessModeFlags::WAIT_FOR_NEW_DATA;
        assert!(flags.contains(AccessModeFlags::RAW));
        assert!(flags.contains(AccessModeFlags::WAIT_FOR_NEW_DATA));
    }

    #[test]
    fn default_is_empty() {
        assert!(AccessModeFlags::default().is_empty());
    }
}
