//! A `DummyBackend` whose per-bar word vectors live in a named, refcounted shared-memory
//! segment, so that independent processes (or independent `Device` handles within one process)
//! opening the same instance name observe the same register state.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use memmap2::MmapMut;
use transfer_types::{Error, Result};

use crate::backend::{check_alignment, Backend, RegisterCatalogue, SdmUri};
use crate::map::numeric;

const HEADER_BYTES: usize = 8; // [spinlock: i32][use_counter: i32]
const BAR_COUNT: usize = 8;
const WORDS_PER_BAR: usize = 16_384;
const SEGMENT_BYTES: usize = HEADER_BYTES + BAR_COUNT * WORDS_PER_BAR * 4;

fn segment_path(instance: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ChimeraTK_SharedDummy_{instance}"))
}

fn word_offset(bar: u8, address: u32) -> usize {
    HEADER_BYTES + bar as usize * WORDS_PER_BAR * 4 + address as usize
}

/// Spinlock stored as the segment's first word, acquired with a bounded busy-wait. Stands in
/// for the original's named inter-process mutex.
fn acquire_header_lock(bytes: &mut [u8]) {
    let lock_bytes: &mut [u8; 4] = (&mut bytes[0..4]).try_into().unwrap();
    loop {
        let current = i32::from_le_bytes(*lock_bytes);
        if current == 0 {
            *lock_bytes = 1i32.to_le_bytes();
            return;
        }
        std::thread::yield_now();
    }
}

fn release_header_lock(bytes: &mut [u8]) {
    let lock_bytes: &mut [u8; 4] = (&mut bytes[0..4]).try_into().unwrap();
    *lock_bytes = 0i32.to_le_bytes();
}

fn use_counter(bytes: &[u8]) -> i32 {
    i32::from_le_bytes(bytes[4..8].try_into().unwrap())
}

fn set_use_counter(bytes: &mut [u8], value: i32) {
    bytes[4..8].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug)]
pub struct SharedDummyBackend {
    mmap: Mutex<MmapMut>,
    catalogue: RegisterCatalogue,
    open: AtomicBool,
    path: PathBuf,
}

impl SharedDummyBackend {
    pub fn open_or_create(instance: &str, catalogue: RegisterCatalogue) -> Result<Self> {
        let path = segment_path(instance);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| Error::io(instance, e.to_string()))?;
        file.set_len(SEGMENT_BYTES as u64)
            .map_err(|e| Error::io(instance, e.to_string()))?;
        let mut mmap = unsafe { MmapMut::map_mut(&file).map_err(|e| Error::io(instance, e.to_string()))? };

        acquire_header_lock(&mut mmap);
        let count = use_counter(&mmap);
        set_use_counter(&mut mmap, count + 1);
        release_header_lock(&mut mmap);

        Ok(Self {
            mmap: Mutex::new(mmap),
            catalogue,
            open: AtomicBool::new(false),
            path,
        })
    }
}

impl Drop for SharedDummyBackend {
    fn drop(&mut self) {
        let mut mmap = self.mmap.lock().unwrap_or_else(|e| e.into_inner());
        acquire_header_lock(&mut mmap);
        let count = (use_counter(&mmap) - 1).max(0);
        set_use_counter(&mut mmap, count);
        release_header_lock(&mut mmap);
        drop(mmap);
        if count == 0 {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Backend for SharedDummyBackend {
    fn open(&self) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        tracing::debug!(backend = "shareddummy", path = %self.path.display(), "opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        tracing::debug!(backend = "shareddummy", "closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn read(&self, bar: u8, address: u32, data: &mut [i32]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpened("shareddummy backend".to_string()));
        }
        check_alignment(address, data.len())?;
        let start = word_offset(bar, address);
        let end = start + data.len() * 4;
        if end > SEGMENT_BYTES {
            return Err(Error::WrongParameter(format!(
                "bar {bar} address {address:#x} exceeds the shared segment"
            )));
        }
        let mut mmap = self.mmap.lock().unwrap_or_else(|e| e.into_inner());
        acquire_header_lock(&mut mmap);
        for (i, word) in data.iter_mut().enumerate() {
            let offset = start + i * 4;
            *word = i32::from_le_bytes(mmap[offset..offset + 4].try_into().unwrap());
        }
        release_header_lock(&mut mmap);
        Ok(())
    }

    fn write(&self, bar: u8, address: u32, data: &[i32]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpened("shareddummy backend".to_string()));
        }
        check_alignment(address, data.len())?;
        let start = word_offset(bar, address);
        let end = start + data.len() * 4;
        if end > SEGMENT_BYTES {
            return Err(Error::WrongParameter(format!(
                "bar {bar} address {address:#x} exceeds the shared segment"
            )));
        }
        let mut mmap = self.mmap.lock().unwrap_or_else(|e| e.into_inner());
        acquire_header_lock(&mut mmap);
        for (i, word) in data.iter().enumerate() {
            let offset = start + i * 4;
            mmap[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        }
        release_header_lock(&mut mmap);
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
    let instance = uri
        .parameters
        .first()
        .cloned()
        .unwrap_or_else(|| "default".to_string());
    let catalogue = match uri.parameters.get(1) {
        Some(map_file) if !map_file.is_empty() => {
            numeric::load_catalogue(map_file).unwrap_or_else(|_| RegisterCatalogue::new())
        }
        _ => RegisterCatalogue::new(),
    };
    Ok(Arc::new(SharedDummyBackend::open_or_create(&instance, catalogue)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_handles_to_the_same_instance_share_state() {
        let instance = "test-instance-a";
        let a = SharedDummyBackend::open_or_create(instance, RegisterCatalogue::new()).unwrap();
        let b = SharedDummyBackend::open_or_create(instance, RegisterCatalogue::new()).unwrap();
        a.open().unwrap();
        b.open().unwrap();
        a.write(0, 0x20, &[1234]).unwrap();
        let mut buf = [0i32; 1];
        b.read(0, 0x20, &mut buf).unwrap();
        assert_eq!(buf[0], 1234);
    }
}
