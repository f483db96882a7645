//! `HandshakingAccessor`: a write-with-acknowledgement decorator. A write locks a per-backend
//! mutex, writes the payload register, then polls a busy register until it clears.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use transfer_types::{AccessModeFlags, VersionNumber};

use crate::accessor::NDRegisterAccessor;
use crate::element::{TransferElement, TransferElementCore};
use crate::error::{Error, Result};
use crate::raw::RawAccessor;
use crate::value::UserValue;

const MAX_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_micros(100);

pub struct HandshakingAccessor<T: UserValue> {
    core: TransferElementCore,
    payload: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
    busy: Arc<Mutex<dyn NDRegisterAccessor<i32>>>,
    backend_lock: Arc<Mutex<()>>,
}

impl<T: UserValue> HandshakingAccessor<T> {
    pub fn new(
        payload: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
        busy: Arc<Mutex<dyn NDRegisterAccessor<i32>>>,
        backend_lock: Arc<Mutex<()>>,
    ) -> Self {
        let (id, name, value_type, readable, writeable) = {
            let guard = payload.lock().unwrap_or_else(|e| e.into_inner());
            (
                guard.id(),
                guard.name(),
                guard.value_type(),
                guard.readable(),
                guard.writeable(),
            )
        };
        Self {
            core: TransferElementCore::new_delegating(id, name, value_type, readable, writeable),
            payload,
            busy,
            backend_lock,
        }
    }
}

impl<T: UserValue> std::fmt::Debug for HandshakingAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakingAccessor")
            .field("name", self.core.name())
            .finish()
    }
}

impl<T: UserValue> TransferElement for HandshakingAccessor<T> {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn pre_read(&mut self) -> Result<()> {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).pre_read()
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        self.payload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .do_read_transfer()
    }

    fn post_read(&mut self, version: VersionNumber) -> Result<()> {
        self.payload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .post_read(version)
    }

    fn pre_write(&mut self) -> Result<()> {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).pre_write()
    }

    fn do_write_transfer(&mut self, version: VersionNumber) -> Result<bool> {
        let _backend_guard = self.backend_lock.lock().unwrap_or_else(|e| e.into_inner());
        let lost = self
            .payload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .do_write_transfer(version)?;

        for attempt in 0..MAX_POLLS {
            let cleared = {
                let mut busy = self.busy.lock().unwrap_or_else(|e| e.into_inner());
                busy.do_read_transfer()?;
                busy.post_read(VersionNumber::new())?;
                busy.channel(0)[0] == 0
            };
            if cleared {
                return Ok(lost);
            }
            tracing::warn!(register = %self.core.name(), attempt, "handshake busy flag still set, retrying");
            std::thread::sleep(POLL_INTERVAL);
        }
        Err(Error::IoError(format!(
            "{}: handshake busy flag never cleared after {MAX_POLLS} polls",
            self.core.name()
        )))
    }

    fn post_write(&mut self) -> Result<()> {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).post_write()
    }
}

impl<T: UserValue> NDRegisterAccessor<T> for HandshakingAccessor<T> {
    fn n_channels(&self) -> usize {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).n_channels()
    }

    fn n_samples_per_channel(&self) -> usize {
        self.payload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .n_samples_per_channel()
    }

    fn channel(&self, channel: usize) -> &[T] {
        panic!("HandshakingAccessor::channel({channel}): access the wrapped buffer via with_target")
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [T] {
        panic!("HandshakingAccessor::channel_mut({channel}): access the wrapped buffer via with_target")
    }

    fn access_mode(&self) -> AccessModeFlags {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).access_mode()
    }

    fn raw_elements(&self) -> Vec<Arc<Mutex<RawAccessor>>> {
        self.payload.lock().unwrap_or_else(|e| e.into_inner()).raw_elements()
    }
}

impl<T: UserValue> HandshakingAccessor<T> {
    pub fn with_target<R>(&self, f: impl FnOnce(&dyn NDRegisterAccessor<T>) -> R) -> R {
        f(&*self.payload.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn with_target_mut<R>(&self, f: impl FnOnce(&mut dyn NDRegisterAccessor<T>) -> R) -> R {
        f(&mut *self.payload.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::{Backend, RegisterCatalogue};
    use crate::converter::FixedPointConverter;
    use crate::cooked::CookedAccessor;
    use crate::raw::RawAccessor;
    use transfer_types::RegisterPath;

    fn make_accessor(backend: &Arc<dyn Backend>, address: u32) -> Arc<Mutex<dyn NDRegisterAccessor<i32>>> {
        let raw = Arc::new(Mutex::new(RawAccessor::new(
            Arc::clone(backend),
            RegisterPath::new("/r"),
            0,
            address,
            1,
            true,
            true,
        )));
        Arc::new(Mutex::new(CookedAccessor::<i32>::new(
            raw,
            FixedPointConverter::raw32(true),
            0,
            1,
            RegisterPath::new("/r"),
            AccessModeFlags::empty(),
            true,
            true,
        )))
    }

    #[test]
    fn write_succeeds_once_busy_clears() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        backend.write(0, 0x44, &[0]).unwrap(); // busy already clear

        let payload = make_accessor(&backend, 0x40);
        let busy = make_accessor(&backend, 0x44);
        let mut handshake = HandshakingAccessor::new(payload, busy, Arc::new(Mutex::new(())));
        handshake.with_target_mut(|p| p.channel_mut(0)[0] = 7);
        handshake.write(VersionNumber::new()).unwrap();
    }

    #[test]
    fn write_times_out_when_busy_never_clears() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        backend.write(0, 0x44, &[1]).unwrap(); // busy stuck

        let payload = make_accessor(&backend, 0x40);
        let busy = make_accessor(&backend, 0x44);
        let mut handshake = HandshakingAccessor::new(payload, busy, Arc::new(Mutex::new(())));
        let result = handshake.write(VersionNumber::new());
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
