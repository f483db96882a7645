//! The low-level raw transfer element: one per contiguous address range claimed from a backend,
//! holding a raw `i32` buffer and performing the actual wire transfer.

use std::sync::Arc;

use transfer_types::{DataType, RegisterPath, VersionNumber};

use crate::backend::Backend;
use crate::element::{TransferElement, TransferElementCore};
use crate::error::Result;

/// One contiguous, 4-byte-aligned address range on a single backend/bar.
#[derive(Debug)]
pub struct RawAccessor {
    core: TransferElementCore,
    backend: Arc<dyn Backend>,
    bar: u8,
    start_address: u32,
    buffer: Vec<i32>,
    shared: bool,
}

impl RawAccessor {
    pub fn new(
        backend: Arc<dyn Backend>,
        path: RegisterPath,
        bar: u8,
        start_address: u32,
        number_of_words: usize,
        readable: bool,
        writeable: bool,
    ) -> Self {
        Self {
            core: TransferElementCore::new(path, DataType::I32, readable, writeable),
            backend,
            bar,
            start_address,
            buffer: vec![0i32; number_of_words],
            shared: false,
        }
    }

    pub fn bar(&self) -> u8 {
        self.bar
    }

    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    pub fn number_of_words(&self) -> usize {
        self.buffer.len()
    }

    pub fn end_address(&self) -> u32 {
        self.start_address + (self.buffer.len() * 4) as u32
    }

    pub fn buffer(&self) -> &[i32] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [i32] {
        &mut self.buffer
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// True iff `other` lives on the same backend and bar, and its address range is adjacent to
    /// or overlaps this one's.
    pub fn is_mergeable(&self, other: &RawAccessor) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
            && self.bar == other.bar
            && self.start_address <= other.end_address()
            && other.start_address <= self.end_address()
    }

    /// Reshapes the raw buffer to cover `[start_address, start_address + number_of_words*4)` and
    /// marks the element as shared between multiple cooked accessors.
    pub fn change_address(&mut self, start_address: u32, number_of_words: usize) {
        self.start_address = start_address;
        self.buffer.resize(number_of_words, 0);
        self.shared = true;
    }
}

impl TransferElement for RawAccessor {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        self.backend.read(self.bar, self.start_address, &mut self.buffer)
    }

    fn do_write_transfer(&mut self, _version: VersionNumber) -> Result<bool> {
        self.backend.write(self.bar, self.start_address, &self.buffer)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::RegisterCatalogue;

    fn backend() -> Arc<dyn Backend> {
        let b = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        b.open().unwrap();
        b
    }

    #[test]
    fn adjacent_ranges_are_mergeable() {
        let backend = backend();
        let a = RawAccessor::new(Arc::clone(&backend), RegisterPath::new("/a"), 0, 0x00, 1, true, true);
        let b = RawAccessor::new(Arc::clone(&backend), RegisterPath::new("/b"), 0, 0x04, 1, true, true);
        assert!(a.is_mergeable(&b));
    }

    #[test]
    fn distant_ranges_are_not_mergeable() {
        let backend = backend();
        let a = RawAccessor::new(Arc::clone(&backend), RegisterPath::new("/a"), 0, 0x00, 1, true, true);
        let b = RawAccessor::new(Arc::clone(&backend), RegisterPath::new("/b"), 0, 0x40, 1, true, true);
        assert!(!a.is_mergeable(&b));
    }

    #[test]
    fn read_transfer_pulls_from_the_backend() {
        let backend = backend();
        backend.write(0, 0x20, &[99]).unwrap();
        let mut raw = RawAccessor::new(backend, RegisterPath::new("/r"), 0, 0x20, 1, true, false);
        raw.do_read_transfer().unwrap();
        assert_eq!(raw.buffer(), &[99]);
    }
}
