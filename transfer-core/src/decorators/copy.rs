//! `CopyRegisterDecorator`: a read-through sub-view (one or more channels, a sample range) over
//! another accessor's buffer, with its own independent storage.

use std::sync::{Arc, Mutex};

use transfer_types::{AccessModeFlags, VersionNumber};

use crate::accessor::NDRegisterAccessor;
use crate::element::{TransferElement, TransferElementCore};
use crate::error::{Error, Result};
use crate::raw::RawAccessor;
use crate::value::UserValue;

/// Copies a rectangular sub-view `[channel_offset..][sample_offset..sample_offset+n_samples]` of
/// `target`'s buffer into its own storage on every `post_read`, and the reverse on `pre_write`.
pub struct CopyRegisterDecorator<T: UserValue> {
    core: TransferElementCore,
    target: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
    channel_offset: usize,
    sample_offset: usize,
    n_channels: usize,
    n_samples: usize,
    buffer: Vec<Vec<T>>,
}

impl<T: UserValue> CopyRegisterDecorator<T> {
    pub fn new(
        target: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
        channel_offset: usize,
        sample_offset: usize,
        n_channels: usize,
        n_samples: usize,
    ) -> Self {
        let (id, name, value_type, readable, writeable) = {
            let guard = target.lock().unwrap_or_else(|e| e.into_inner());
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
            target,
            channel_offset,
            sample_offset,
            n_channels,
            n_samples,
            buffer: vec![vec![T::default(); n_samples]; n_channels],
        }
    }

    /// A sub-view covering the target's entire buffer — used when the only thing that changed
    /// is the target's identity (e.g. after a `TransferGroup` merge), not the window.
    pub fn whole(target: Arc<Mutex<dyn NDRegisterAccessor<T>>>) -> Self {
        let (n_channels, n_samples) = {
            let guard = target.lock().unwrap_or_else(|e| e.into_inner());
            (guard.n_channels(), guard.n_samples_per_channel())
        };
        Self::new(target, 0, 0, n_channels, n_samples)
    }
}

impl<T: UserValue> std::fmt::Debug for CopyRegisterDecorator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyRegisterDecorator")
            .field("name", self.core.name())
            .field("channel_offset", &self.channel_offset)
            .field("sample_offset", &self.sample_offset)
            .finish()
    }
}

impl<T: UserValue> TransferElement for CopyRegisterDecorator<T> {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn pre_read(&mut self) -> Result<()> {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).pre_read()
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        self.target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .do_read_transfer()
    }

    fn post_read(&mut self, version: VersionNumber) -> Result<()> {
        let guard = self.target.lock().unwrap_or_else(|e| e.into_inner());
        for c in 0..self.n_channels {
            let src = guard.channel(self.channel_offset + c);
            self.buffer[c].clone_from_slice(&src[self.sample_offset..self.sample_offset + self.n_samples]);
        }
        drop(guard);
        self.core_mut().stamp(version);
        Ok(())
    }

    fn pre_write(&mut self) -> Result<()> {
        if !self.core.writeable() {
            return Err(Error::NotImplemented(format!(
                "{} is a read-only view",
                self.core.name()
            )));
        }
        let mut guard = self.target.lock().unwrap_or_else(|e| e.into_inner());
        for c in 0..self.n_channels {
            let dst = guard.channel_mut(self.channel_offset + c);
            dst[self.sample_offset..self.sample_offset + self.n_samples].clone_from_slice(&self.buffer[c]);
        }
        Ok(())
    }

    fn do_write_transfer(&mut self, version: VersionNumber) -> Result<bool> {
        self.target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .do_write_transfer(version)
    }

    fn post_write(&mut self) -> Result<()> {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).post_write()
    }
}

impl<T: UserValue> NDRegisterAccessor<T> for CopyRegisterDecorator<T> {
    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn n_samples_per_channel(&self) -> usize {
        self.n_samples
    }

    fn channel(&self, channel: usize) -> &[T] {
        &self.buffer[channel]
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [T] {
        &mut self.buffer[channel]
    }

    fn access_mode(&self) -> AccessModeFlags {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).access_mode()
    }

    fn raw_elements(&self) -> Vec<Arc<Mutex<RawAccessor>>> {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).raw_elements()
    }

    fn set_raw_elements(&mut self, elements: Vec<Arc<Mutex<RawAccessor>>>, word_offset: usize) {
        self.target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_raw_elements(elements, word_offset);
    }

    fn raw_word_offset(&self) -> usize {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).raw_word_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::TransferElementCore as Core;
    use transfer_types::{DataType, RegisterPath};

    #[derive(Debug)]
    struct Memory {
        core: Core,
        data: Vec<i32>,
    }

    impl TransferElement for Memory {
        fn core(&self) -> &Core {
            &self.core
        }
        fn core_mut(&mut self) -> &mut Core {
            &mut self.core
        }
        fn do_read_transfer(&mut self) -> Result<()> {
            Ok(())
        }
        fn do_write_transfer(&mut self, _version: VersionNumber) -> Result<bool> {
            Ok(false)
        }
    }

    impl NDRegisterAccessor<i32> for Memory {
        fn n_channels(&self) -> usize {
            1
        }
        fn n_samples_per_channel(&self) -> usize {
            self.data.len()
        }
        fn channel(&self, _channel: usize) -> &[i32] {
            &self.data
        }
        fn channel_mut(&mut self, _channel: usize) -> &mut [i32] {
            &mut self.data
        }
        fn access_mode(&self) -> AccessModeFlags {
            AccessModeFlags::empty()
        }
    }

    #[test]
    fn sub_view_copies_only_its_window() {
        let target: Arc<Mutex<dyn NDRegisterAccessor<i32>>> = Arc::new(Mutex::new(Memory {
            core: Core::new(RegisterPath::new("/m"), DataType::I32, true, true),
            data: vec![10, 20, 30, 40],
        }));
        let mut view = CopyRegisterDecorator::new(Arc::clone(&target), 0, 1, 1, 2);
        view.post_read(VersionNumber::new()).unwrap();
        assert_eq!(view.channel(0), &[20, 30]);
    }
}
