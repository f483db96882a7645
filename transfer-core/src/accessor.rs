//! [`NDRegisterAccessor`]: the typed, two-dimensional (`[channel][sample]`) view over one or
//! more raw registers, plus the [`ScalarRegisterAccessor`]/[`OneDRegisterAccessor`] convenience
//! wrappers most application code actually holds.

use std::sync::{Arc, Mutex};

use transfer_types::{AccessModeFlags, RegisterPath, TransferElementId, UserType, VersionNumber};

use crate::element::TransferElement;
use crate::error::Result;
use crate::raw::RawAccessor;
use crate::value::UserValue;

/// A typed accessor over a `[channel][sample]` buffer backed by one or more raw registers.
///
/// Kept free of method-level generics so that `dyn NDRegisterAccessor<T>` stays object safe:
/// every concrete accessor and every decorator in [`crate::decorators`] is stored behind
/// `Arc<Mutex<dyn NDRegisterAccessor<T>>>` and delegates to exactly one target.
pub trait NDRegisterAccessor<T: UserValue>: TransferElement {
    fn n_channels(&self) -> usize;
    fn n_samples_per_channel(&self) -> usize;

    fn channel(&self, channel: usize) -> &[T];
    fn channel_mut(&mut self, channel: usize) -> &mut [T];

    fn access_mode(&self) -> AccessModeFlags;

    /// Reads one element converted to the type-erased representation, independent of `T`.
    /// Used by decorators and logical-name views that don't know the concrete `T` at compile
    /// time.
    fn get_as_cooked(&self, channel: usize, sample: usize) -> UserType {
        self.channel(channel)[sample].to_user_type()
    }

    /// Writes one element from the type-erased representation.
    fn set_as_cooked(&mut self, channel: usize, sample: usize, value: &UserType) {
        self.channel_mut(channel)[sample] = T::from_user_type(value);
    }

    /// Whether `other` may be substituted for `self` without changing observable behaviour —
    /// true iff they wrap the same underlying element.
    fn may_replace_other(&self, other: &dyn NDRegisterAccessor<T>) -> bool {
        self.id() == other.id()
    }

    /// The raw, backend-owning elements this accessor ultimately reads and writes through.
    /// Empty for accessors with no backend underneath them (logical-name constants and
    /// variables). A [`crate::group::TransferGroup`] uses this to discover what to merge.
    fn raw_elements(&self) -> Vec<Arc<Mutex<RawAccessor>>> {
        Vec::new()
    }

    /// Re-points this accessor at a (possibly just-merged) raw element, at the given word
    /// offset into its buffer. Default: no-op, for accessors with no raw backing.
    fn set_raw_elements(&mut self, _elements: Vec<Arc<Mutex<RawAccessor>>>, _word_offset: usize) {}

    /// The word offset most recently passed to [`Self::set_raw_elements`] (or the accessor's
    /// construction-time offset). A [`crate::group::TransferGroup`] reads this back when a raw
    /// element it already owns grows *downward*, so it can shift every member that already
    /// pointed at it by the same number of words the element's start address moved. Default: 0,
    /// for accessors with no raw backing.
    fn raw_word_offset(&self) -> usize {
        0
    }
}

fn lock_poisoned<G>(guard: std::sync::LockResult<G>) -> G {
    match guard {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A convenience handle around a single-element `NDRegisterAccessor`. Most call sites that care
/// about exactly one value hold one of these rather than talking to the trait object directly.
pub struct ScalarRegisterAccessor<T: UserValue> {
    target: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
}

impl<T: UserValue> ScalarRegisterAccessor<T> {
    pub fn new(target: Arc<Mutex<dyn NDRegisterAccessor<T>>>) -> Self {
        Self { target }
    }

    pub fn get(&self) -> T {
        lock_poisoned(self.target.lock()).channel(0)[0].clone()
    }

    pub fn set(&mut self, value: T) {
        lock_poisoned(self.target.lock()).channel_mut(0)[0] = value;
    }

    pub fn read(&mut self) -> Result<()> {
        lock_poisoned(self.target.lock()).read()
    }

    pub fn read_non_blocking(&mut self) -> Result<bool> {
        lock_poisoned(self.target.lock()).read_non_blocking()
    }

    pub fn read_latest(&mut self) -> Result<bool> {
        lock_poisoned(self.target.lock()).read_latest()
    }

    pub fn write(&mut self) -> Result<bool> {
        let version = VersionNumber::new();
        lock_poisoned(self.target.lock()).write(version)
    }

    pub fn name(&self) -> RegisterPath {
        lock_poisoned(self.target.lock()).name()
    }

    pub fn id(&self) -> TransferElementId {
        lock_poisoned(self.target.lock()).id()
    }

    pub fn access_mode(&self) -> AccessModeFlags {
        lock_poisoned(self.target.lock()).access_mode()
    }
}

impl<T: UserValue> Clone for ScalarRegisterAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T: UserValue> std::fmt::Debug for ScalarRegisterAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarRegisterAccessor")
            .field("name", &self.name())
            .field("id", &self.id())
            .finish()
    }
}

/// A convenience handle around a single-channel, multi-sample `NDRegisterAccessor`.
pub struct OneDRegisterAccessor<T: UserValue> {
    target: Arc<Mutex<dyn NDRegisterAccessor<T>>>,
}

impl<T: UserValue> OneDRegisterAccessor<T> {
    pub fn new(target: Arc<Mutex<dyn NDRegisterAccessor<T>>>) -> Self {
        Self { target }
    }

    pub fn len(&self) -> usize {
        lock_poisoned(self.target.lock()).n_samples_per_channel()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_data(&self) -> Vec<T> {
        lock_poisoned(self.target.lock()).channel(0).to_vec()
    }

    pub fn set_data(&mut self, data: &[T]) {
        let mut guard = lock_poisoned(self.target.lock());
        let buf = guard.channel_mut(0);
        let n = buf.len().min(data.len());
        buf[..n].clone_from_slice(&data[..n]);
    }

    pub fn read(&mut self) -> Result<()> {
        lock_poisoned(self.target.lock()).read()
    }

    pub fn read_non_blocking(&mut self) -> Result<bool> {
        lock_poisoned(self.target.lock()).read_non_blocking()
    }

    pub fn read_latest(&mut self) -> Result<bool> {
        lock_poisoned(self.target.lock()).read_latest()
    }

    pub fn write(&mut self) -> Result<bool> {
        let version = VersionNumber::new();
        lock_poisoned(self.target.lock()).write(version)
    }

    pub fn name(&self) -> RegisterPath {
        lock_poisoned(self.target.lock()).name()
    }

    pub fn id(&self) -> TransferElementId {
        lock_poisoned(self.target.lock()).id()
    }
}

impl<T: UserValue> Clone for OneDRegisterAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T: UserValue> std::fmt::Debug for OneDRegisterAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneDRegisterAccessor")
            .field("name", &self.name())
            .field("len", &self.len())
            .finish()
    }
}
