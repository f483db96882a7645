//! [`TransferElement`]: the abstract unit of I/O and its three-stage read/write protocol.

use transfer_types::{DataType, RegisterPath, TransferElementId, VersionNumber};

use crate::error::Result;

/// Where a [`TransferElement`] sits in its read/write protocol. Advanced by the default
/// `read`/`write` compositions in [`TransferElement`]; concrete elements that override the
/// individual stages are responsible for calling [`TransferElementCore::enter`] themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    ReadPending,
    ReadDataAvailable,
    WritePending,
    WriteDone,
}

/// Fields shared by every concrete `TransferElement`: identity, naming, capability bits and the
/// current protocol stage. Concrete accessors and decorators embed one of these rather than
/// inheriting from a base class.
#[derive(Debug, Clone)]
pub struct TransferElementCore {
    id: TransferElementId,
    name: RegisterPath,
    unit: String,
    description: String,
    readable: bool,
    writeable: bool,
    value_type: DataType,
    version: VersionNumber,
    state: TransferState,
    has_active_future: bool,
}

impl TransferElementCore {
    /// Mints a fresh element identity.
    pub fn new(name: RegisterPath, value_type: DataType, readable: bool, writeable: bool) -> Self {
        Self {
            id: TransferElementId::new(),
            name,
            unit: "n./a.".to_string(),
            description: String::new(),
            readable,
            writeable,
            value_type,
            version: VersionNumber::new(),
            state: TransferState::Idle,
            has_active_future: false,
        }
    }

    /// Builds a core that shares `id` with another element, used by decorators so that two
    /// accessors to the same underlying register compare equal.
    pub fn new_delegating(
        id: TransferElementId,
        name: RegisterPath,
        value_type: DataType,
        readable: bool,
        writeable: bool,
    ) -> Self {
        let mut core = Self::new(name, value_type, readable, writeable);
        core.id = id;
        core
    }

    pub fn id(&self) -> TransferElementId {
        self.id
    }

    pub fn name(&self) -> &RegisterPath {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn writeable(&self) -> bool {
        self.writeable
    }

    pub fn read_only(&self) -> bool {
        self.readable && !self.writeable
    }

    pub fn value_type(&self) -> DataType {
        self.value_type
    }

    pub fn version(&self) -> VersionNumber {
        self.version
    }

    pub fn stamp(&mut self, version: VersionNumber) {
        self.version = version;
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn enter(&mut self, state: TransferState) {
        self.state = state;
    }

    pub fn has_active_future(&self) -> bool {
        self.has_active_future
    }

    pub fn set_active_future(&mut self, active: bool) {
        self.has_active_future = active;
    }
}

/// The abstract unit of a single register or address range participating in a coordinated
/// transfer.
///
/// Implementors provide the two transfer primitives (`do_read_transfer`, `do_write_transfer`);
/// the pre/post hooks and the public `read`/`write` compositions have sensible defaults that
/// most leaf elements don't need to override.
pub trait TransferElement: std::fmt::Debug + Send {
    /// Shared identity/capability fields. See [`TransferElementCore`].
    fn core(&self) -> &TransferElementCore;
    /// Mutable access to the shared fields.
    fn core_mut(&mut self) -> &mut TransferElementCore;

    fn id(&self) -> TransferElementId {
        self.core().id()
    }

    fn name(&self) -> RegisterPath {
        self.core().name().clone()
    }

    fn readable(&self) -> bool {
        self.core().readable()
    }

    fn writeable(&self) -> bool {
        self.core().writeable()
    }

    fn read_only(&self) -> bool {
        self.core().read_only()
    }

    fn value_type(&self) -> DataType {
        self.core().value_type()
    }

    fn version_number(&self) -> VersionNumber {
        self.core().version()
    }

    fn has_active_future(&self) -> bool {
        self.core().has_active_future()
    }

    /// Prepares the user buffer for a read. Default: no-op.
    fn pre_read(&mut self) -> Result<()> {
        Ok(())
    }

    /// Moves bytes over the wire for a blocking read. Required.
    fn do_read_transfer(&mut self) -> Result<()>;

    /// Non-blocking read attempt. Returns `true` iff new data was consumed.
    ///
    /// Default: delegates to the blocking variant and always reports success, which is the
    /// correct behaviour for any element that wasn't opened with `wait_for_new_data`.
    fn do_read_transfer_non_blocking(&mut self) -> Result<bool> {
        self.do_read_transfer()?;
        Ok(true)
    }

    /// Discards everything between the last observed value and the most recent one. Returns
    /// `true` iff an update existed.
    ///
    /// Default: same as [`Self::do_read_transfer_non_blocking`] — without `wait_for_new_data`
    /// this always runs the transfer synchronously and reports `true`.
    fn do_read_transfer_latest(&mut self) -> Result<bool> {
        self.do_read_transfer()?;
        Ok(true)
    }

    /// Publishes the freshly transferred data into the user buffer and stamps `version`.
    /// Default: just stamps the version; most accessors override this to copy data too.
    fn post_read(&mut self, version: VersionNumber) -> Result<()> {
        self.core_mut().stamp(version);
        Ok(())
    }

    /// Prepares the outgoing buffer for a write. Default: no-op.
    fn pre_write(&mut self) -> Result<()> {
        Ok(())
    }

    /// Moves bytes over the wire for a write. Returns `true` if a previously pending write was
    /// lost (buffer overflow on the producing side). Required.
    fn do_write_transfer(&mut self, version: VersionNumber) -> Result<bool>;

    /// Finalises a write. Default: no-op.
    fn post_write(&mut self) -> Result<()> {
        Ok(())
    }

    /// Composes `pre_read` → `do_read_transfer` → `post_read`.
    fn read(&mut self) -> Result<()> {
        self.core_mut().enter(TransferState::ReadPending);
        self.pre_read()?;
        self.do_read_transfer()?;
        self.core_mut().enter(TransferState::ReadDataAvailable);
        let version = VersionNumber::new();
        self.post_read(version)?;
        self.core_mut().enter(TransferState::Idle);
        Ok(())
    }

    /// Composes `pre_read` → `do_read_transfer_non_blocking` → `post_read` (only if new data
    /// arrived).
    fn read_non_blocking(&mut self) -> Result<bool> {
        self.core_mut().enter(TransferState::ReadPending);
        self.pre_read()?;
        let got_data = self.do_read_transfer_non_blocking()?;
        if got_data {
            self.core_mut().enter(TransferState::ReadDataAvailable);
            let version = VersionNumber::new();
            self.post_read(version)?;
        }
        self.core_mut().enter(TransferState::Idle);
        Ok(got_data)
    }

    /// Composes `pre_read` → `do_read_transfer_latest` → `post_read`.
    fn read_latest(&mut self) -> Result<bool> {
        self.core_mut().enter(TransferState::ReadPending);
        self.pre_read()?;
        let got_data = self.do_read_transfer_latest()?;
        self.core_mut().enter(TransferState::ReadDataAvailable);
        let version = VersionNumber::new();
        self.post_read(version)?;
        self.core_mut().enter(TransferState::Idle);
        Ok(got_data)
    }

    /// Composes `pre_write` → `do_write_transfer` → `post_write`. Returns `true` if a
    /// previously pending write was lost.
    fn write(&mut self, version: VersionNumber) -> Result<bool> {
        self.core_mut().enter(TransferState::WritePending);
        self.pre_write()?;
        let lost = self.do_write_transfer(version)?;
        self.core_mut().enter(TransferState::WriteDone);
        self.post_write()?;
        self.core_mut().enter(TransferState::Idle);
        Ok(lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter {
        core: TransferElementCore,
        reads: u32,
    }

    impl TransferElement for Counter {
        fn core(&self) -> &TransferElementCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut TransferElementCore {
            &mut self.core
        }
        fn do_read_transfer(&mut self) -> Result<()> {
            self.reads += 1;
            Ok(())
        }
        fn do_write_transfer(&mut self, _version: VersionNumber) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn read_stamps_a_fresh_version_and_returns_to_idle() {
        let mut counter = Counter {
            core: TransferElementCore::new(RegisterPath::new("/c"), DataType::I32, true, false),
            reads: 0,
        };
        let before = counter.version_number();
        counter.read().unwrap();
        assert_eq!(counter.reads, 1);
        assert!(counter.version_number() > before);
        assert_eq!(counter.core().state(), TransferState::Idle);
    }

    #[test]
    fn delegating_core_shares_id() {
        let base = TransferElementCore::new(RegisterPath::new("/r"), DataType::I32, true, true);
        let id = base.id();
        let delegated =
            TransferElementCore::new_delegating(id, RegisterPath::new("/r"), DataType::I32, true, true);
        assert_eq!(base.id(), delegated.id());
    }
}
