//! In-process, numeric-addressed backend over a plain `Vec<i32>` per bar. No persistence: state
//! lives only as long as the `Arc<DummyBackend>` does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use transfer_types::{Error, Result};

use crate::backend::{check_alignment, Backend, RegisterCatalogue, SdmUri};
use crate::map::numeric;

#[derive(Debug)]
pub struct DummyBackend {
    bars: Mutex<HashMap<u8, Vec<i32>>>,
    catalogue: RegisterCatalogue,
    open: AtomicBool,
}

impl DummyBackend {
    pub fn new(catalogue: RegisterCatalogue) -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            catalogue,
            open: AtomicBool::new(false),
        }
    }

    fn ensure_len(bar_words: &mut Vec<i32>, words_needed: usize) {
        if bar_words.len() < words_needed {
            bar_words.resize(words_needed, 0);
        }
    }
}

impl Backend for DummyBackend {
    fn open(&self) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        tracing::debug!(backend = "dummy", "opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        tracing::debug!(backend = "dummy", "closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn read(&self, bar: u8, address: u32, data: &mut [i32]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpened("dummy backend".to_string()));
        }
        check_alignment(address, data.len())?;
        let word_index = (address / 4) as usize;
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        let words = bars.entry(bar).or_default();
        Self::ensure_len(words, word_index + data.len());
        data.copy_from_slice(&words[word_index..word_index + data.len()]);
        tracing::debug!(backend = "dummy", bar, address, words = data.len(), "read");
        Ok(())
    }

    fn write(&self, bar: u8, address: u32, data: &[i32]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpened("dummy backend".to_string()));
        }
        check_alignment(address, data.len())?;
        let word_index = (address / 4) as usize;
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        let words = bars.entry(bar).or_default();
        Self::ensure_len(words, word_index + data.len());
        words[word_index..word_index + data.len()].copy_from_slice(data);
        tracing::debug!(backend = "dummy", bar, address, words = data.len(), "write");
        Ok(())
    }

    fn register_catalogue(&self) -> RegisterCatalogue {
        self.catalogue.clone()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) fn create(uri: &SdmUri) -> Result<Arc<dyn Backend>> {
    let catalogue = match uri.parameters.first() {
        Some(map_file) if !map_file.is_empty() => numeric::load_catalogue(map_file)
            .unwrap_or_else(|_| RegisterCatalogue::new()),
        _ => RegisterCatalogue::new(),
    };
    Ok(Arc::new(DummyBackend::new(catalogue)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_of_unwritten_word_is_zero_and_grows_the_bar() {
        let backend = DummyBackend::new(RegisterCatalogue::new());
        backend.open().unwrap();
        let mut buf = [0i32; 1];
        backend.read(0, 0x20, &mut buf).unwrap();
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let backend = DummyBackend::new(RegisterCatalogue::new());
        backend.open().unwrap();
        backend.write(0, 0x20, &[0xDEADBEEFu32 as i32]).unwrap();
        let mut buf = [0i32; 1];
        backend.read(0, 0x20, &mut buf).unwrap();
        assert_eq!(buf[0], 0xDEADBEEFu32 as i32);
    }

    #[test]
    fn rejects_access_before_open() {
        let backend = DummyBackend::new(RegisterCatalogue::new());
        let mut buf = [0i32; 1];
        assert!(matches!(backend.read(0, 0, &mut buf), Err(Error::NotOpened(_))));
    }

    #[test]
    fn rejects_misaligned_address() {
        let backend = DummyBackend::new(RegisterCatalogue::new());
        backend.open().unwrap();
        let mut buf = [0i32; 1];
        assert!(matches!(backend.read(0, 1, &mut buf), Err(Error::WrongParameter(_))));
    }
}
