//! Accessors for the two logical-name target kinds that never touch a wire backend:
//! `INT_CONSTANT` (a fixed, read-only value baked in at map-parse time) and `INT_VARIABLE` (a
//! process-local value shared by every accessor opened against the same
//! [`LogicalNameMappingBackend`]).
//!
//! The other three target kinds (`REGISTER`, `RANGE`, `CHANNEL`) need no dedicated accessor type:
//! `REGISTER` resolves to the target's own accessor unchanged, and `RANGE`/`CHANNEL` resolve to a
//! [`crate::decorators::copy::CopyRegisterDecorator`] windowed over it. Building those is the
//! job of whatever opens the device, since it needs the target device's accessor factory; see
//! [`crate::device`].

use std::sync::Arc;

use transfer_types::{AccessModeFlags, RegisterPath, UserType, VersionNumber};

use crate::accessor::NDRegisterAccessor;
use crate::backend::logical_name_mapping::LogicalNameMappingBackend;
use crate::element::{TransferElement, TransferElementCore};
use crate::error::{Error, Result};
use crate::value::UserValue;

/// A read-only accessor over an `INT_CONSTANT` logical-name target.
#[derive(Debug)]
pub struct IntConstantAccessor<T: UserValue> {
    core: TransferElementCore,
    value: T,
}

impl<T: UserValue> IntConstantAccessor<T> {
    pub fn new(path: RegisterPath, raw_value: i64) -> Self {
        let value = T::from_user_type(&UserType::I64(raw_value));
        Self {
            core: TransferElementCore::new(path, T::DATA_TYPE, true, false),
            value,
        }
    }
}

impl<T: UserValue> TransferElement for IntConstantAccessor<T> {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        Ok(())
    }

    fn do_write_transfer(&mut self, _version: VersionNumber) -> Result<bool> {
        Err(Error::NotImplemented(format!(
            "{} is an INT_CONSTANT and cannot be written",
            self.core.name()
        )))
    }
}

impl<T: UserValue> NDRegisterAccessor<T> for IntConstantAccessor<T> {
    fn n_channels(&self) -> usize {
        1
    }

    fn n_samples_per_channel(&self) -> usize {
        1
    }

    fn channel(&self, _channel: usize) -> &[T] {
        std::slice::from_ref(&self.value)
    }

    fn channel_mut(&mut self, _channel: usize) -> &mut [T] {
        std::slice::from_mut(&mut self.value)
    }

    fn access_mode(&self) -> AccessModeFlags {
        AccessModeFlags::empty()
    }
}

/// A read/write accessor over an `INT_VARIABLE` logical-name target. The value lives in the
/// owning [`LogicalNameMappingBackend`], so every accessor opened against the same path observes
/// the same state.
pub struct IntVariableAccessor<T: UserValue> {
    core: TransferElementCore,
    backend: Arc<dyn crate::backend::Backend>,
    path: RegisterPath,
    buffer: T,
}

impl<T: UserValue> IntVariableAccessor<T> {
    pub fn new(path: RegisterPath, backend: Arc<dyn crate::backend::Backend>) -> Self {
        Self {
            core: TransferElementCore::new(path.clone(), T::DATA_TYPE, true, true),
            backend,
            path,
            buffer: T::default(),
        }
    }

    fn mapping_backend(&self) -> Result<&LogicalNameMappingBackend> {
        self.backend
            .as_any()
            .downcast_ref::<LogicalNameMappingBackend>()
            .ok_or_else(|| Error::WrongParameter(format!("{}: not a logical-name-mapping backend", self.path)))
    }
}

impl<T: UserValue> std::fmt::Debug for IntVariableAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntVariableAccessor")
            .field("path", &self.path)
            .finish()
    }
}

impl<T: UserValue> TransferElement for IntVariableAccessor<T> {
    fn core(&self) -> &TransferElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransferElementCore {
        &mut self.core
    }

    fn do_read_transfer(&mut self) -> Result<()> {
        let raw = self.mapping_backend()?.read_variable(&self.path)?;
        self.buffer = T::from_user_type(&UserType::I64(raw));
        Ok(())
    }

    fn do_write_transfer(&mut self, _version: VersionNumber) -> Result<bool> {
        let raw = match self.buffer.to_user_type() {
            UserType::I64(v) => v,
            other => other.to_f64().unwrap_or_default() as i64,
        };
        self.mapping_backend()?.write_variable(&self.path, raw)?;
        Ok(false)
    }
}

impl<T: UserValue> NDRegisterAccessor<T> for IntVariableAccessor<T> {
    fn n_channels(&self) -> usize {
        1
    }

    fn n_samples_per_channel(&self) -> usize {
        1
    }

    fn channel(&self, _channel: usize) -> &[T] {
        std::slice::from_ref(&self.buffer)
    }

    fn channel_mut(&mut self, _channel: usize) -> &mut [T] {
        std::slice::from_mut(&mut self.buffer)
    }

    fn access_mode(&self) -> AccessModeFlags {
        AccessModeFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::lmap;

    const SAMPLE: &str = r#"
        <logicalNameMap>
          <redirectedRegister name="/scale">
            <targetType>INT_CONSTANT</targetType>
            <value>42</value>
          </redirectedRegister>
          <redirectedRegister name="/offset">
            <targetType>INT_VARIABLE</targetType>
            <value>7</value>
          </redirectedRegister>
        </logicalNameMap>
    "#;

    #[test]
    fn constant_accessor_reads_the_baked_in_value_and_rejects_writes() {
        let mut accessor = IntConstantAccessor::<i32>::new(RegisterPath::new("/scale"), 42);
        accessor.read().unwrap();
        assert_eq!(accessor.channel(0)[0], 42);
        assert!(accessor.write(VersionNumber::new()).is_err());
    }

    #[test]
    fn variable_accessor_shares_state_through_the_backend() {
        let map = lmap::parse(SAMPLE).unwrap();
        let backend: Arc<dyn crate::backend::Backend> =
            Arc::new(LogicalNameMappingBackend::new(map, None));
        let path = RegisterPath::new("/offset");

        let mut a = IntVariableAccessor::<i32>::new(path.clone(), Arc::clone(&backend));
        let mut b = IntVariableAccessor::<i32>::new(path, Arc::clone(&backend));

        a.read().unwrap();
        assert_eq!(a.channel(0)[0], 7);

        a.channel_mut(0)[0] = 99;
        a.write(VersionNumber::new()).unwrap();

        b.read().unwrap();
        assert_eq!(b.channel(0)[0], 99);
    }
}
