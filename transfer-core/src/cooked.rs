//! The cooked accessor: a [`NDRegisterAccessor`] that wraps a [`RawAccessor`] plus a
//! [`FixedPointConverter`] to produce a typed user buffer.

use std::sync::{Arc, Mutex};

use transfer_types::{AccessModeFlags, RegisterPath, VersionNumber};

use crate::accessor::NDRegisterAccessor;
use crate::converter::FixedPointConverter;
use crate::element::{TransferElement, TransferElementCore};
use crate::error::Result;
use crate::raw::RawAccessor;
use crate::value::UserValue;

/// Wraps a shared [`RawAccessor`] at a fixed word offset and element count, converting through a
/// [`FixedPointConverter`] on every `post_read`/`pre_write`.
///
/// The word offset stays valid across a `TransferGroup` merge: as long as the covering raw
/// element still spans `[word_offset, word_offset + n_elements)`, reshaping the raw buffer
/// elsewhere doesn't invalidate this accessor.
pub struct CookedAccessor<T: UserValue> {
    core: TransferElementCore,
    raw: Arc<Mutex<RawAccessor>>,
    converter: FixedPointConverter,
    word_offset: usize,
    n_elements: usize,
    mode: AccessModeFlags,
    buffer: Vec<T>,
}

impl<T: UserValue> CookedAccessor<T> {
    pub fn new(
        raw: Arc<Mutex<RawAccessor>>,
        converter: FixedPointConverter,
        word_offset: usize,
        n_elements: usize,
        path: RegisterPath,
        mode: AccessModeFlags,
        readable: bool,
        writeable: bool,
    ) -> Self {
        Self {
            core: TransferElementCore::new(path, T::DATA_TYPE, readable, writeable),
            raw,
            converter,
            word_offset,
            n_elements,
            mode,
            buffer: vec![T::default(); n_elements],
        }
    }

    pub fn raw(&self) -> &Arc<Mutex<RawAccessor>> {
        &self.raw
    }

    pub fn word_offset(&self) -> usize {
        self.word_offset
    }
}

impl<T: UserValue> std::fmt::Debug for CookedAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookedAccessor")
            .field("name", self.core.name())
            .field("word_offset", &self.word_offset)
            .field("n_elements", &self.n_elements)
            .finish()
    }
}

impl<T: UserValue> TransferElement for CookedAccessor<T> {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).do_read_transfer()
    }

    fn post_read(&mut self, version: VersionNumber) -> Result<()> {
        let raw_guard = self.raw.lock().unwrap_or_else(|e| e.into_inner());
        let words = &raw_guard.buffer()[self.word_offset..self.word_offset + self.n_elements];
        for (dst, &raw_word) in self.buffer.iter_mut().zip(words) {
            let cooked = if self.mode.contains(AccessModeFlags::RAW) {
                transfer_types::UserType::I32(raw_word)
            } else {
                self.converter.to_cooked(raw_word, T::DATA_TYPE)
            };
            *dst = T::from_user_type(&cooked);
        }
        self.core_mut().stamp(version);
        Ok(())
    }

    fn pre_write(&mut self) -> Result<()> {
        let mut raw_words = Vec::with_capacity(self.buffer.len());
        for value in &self.buffer {
            let raw_word = if self.mode.contains(AccessModeFlags::RAW) {
                match value.to_user_type() {
                    transfer_types::UserType::I32(v) => v,
                    other => other.to_f64().unwrap_or_default() as i32,
                }
            } else {
                self.converter.to_raw(&value.to_user_type())?
            };
            raw_words.push(raw_word);
        }
        let mut raw_guard = self.raw.lock().unwrap_or_else(|e| e.into_inner());
        raw_guard.buffer_mut()[self.word_offset..self.word_offset + self.n_elements]
            .copy_from_slice(&raw_words);
        Ok(())
    }

    fn do_write_transfer(&mut self, version: VersionNumber) -> Result<bool> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).do_write_transfer(version)
    }
}

impl<T: UserValue> NDRegisterAccessor<T> for CookedAccessor<T> {
    fn n_channels(&self) -> usize {
        1
    }

    fn n_samples_per_channel(&self) -> usize {
        self.n_elements
    }

    fn channel(&self, _channel: usize) -> &[T] {
        &self.buffer
    }

    fn channel_mut(&mut self, _channel: usize) -> &mut [T] {
        &mut self.buffer
    }

    fn access_mode(&self) -> AccessModeFlags {
        self.mode
    }

    fn raw_elements(&self) -> Vec<Arc<Mutex<RawAccessor>>> {
        vec![Arc::clone(&self.raw)]
    }

    fn set_raw_elements(&mut self, elements: Vec<Arc<Mutex<RawAccessor>>>, word_offset: usize) {
        if let Some(raw) = elements.into_iter().next() {
            self.raw = raw;
            self.word_offset = word_offset;
        }
    }

    fn raw_word_offset(&self) -> usize {
        self.word_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::{Backend, RegisterCatalogue};

    fn raw_over_dummy(address: u32) -> Arc<Mutex<RawAccessor>> {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        Arc::new(Mutex::new(RawAccessor::new(
            backend,
            RegisterPath::new("/raw"),
            0,
            address,
            1,
            true,
            true,
        )))
    }

    #[test]
    fn cooked_read_converts_through_fixed_point() {
        let raw = raw_over_dummy(0x20);
        raw.lock().unwrap().backend().write(0, 0x20, &[4]).unwrap();
        let converter = FixedPointConverter::new(16, 1, false).unwrap(); // 4 raw -> 2.0 cooked
        let mut cooked = CookedAccessor::<f64>::new(
            raw,
            converter,
            0,
            1,
            RegisterPath::new("/cooked"),
            AccessModeFlags::empty(),
            true,
            true,
        );
        cooked.read().unwrap();
        assert_eq!(cooked.channel(0)[0], 2.0);
    }

    #[test]
    fn raw_mode_bypasses_conversion() {
        let raw = raw_over_dummy(0x24);
        raw.lock().unwrap().backend().write(0, 0x24, &[7]).unwrap();
        let converter = FixedPointConverter::new(16, 4, false).unwrap();
        let mut cooked = CookedAccessor::<i32>::new(
            raw,
            converter,
            0,
            1,
            RegisterPath::new("/raw_mode"),
            AccessModeFlags::RAW,
            true,
            true,
        );
        cooked.read().unwrap();
        assert_eq!(cooked.channel(0)[0], 7);
    }
}
