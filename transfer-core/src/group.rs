//! [`TransferGroup`]: coordinates several accessors sharing a backend into one ordered,
//! merge-optimised transfer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use transfer_types::{TransferElementId, VersionNumber};

use crate::accessor::NDRegisterAccessor;
use crate::error::Result;
use crate::raw::RawAccessor;
use crate::value::UserValue;

/// Groups accessors of a single user type so their raw transfers can be merged and their
/// pre/do/post stages run in one deterministic pass.
///
/// Single-typed rather than heterogeneous: the original's group holds accessors behind an
/// abstract, non-generic `TransferElement*`, which Rust can't express object-safely for a type
/// carrying a generic `channel()`/`get_as_cooked()`. Grouping registers of different cooked types
/// means opening one `TransferGroup<T>` per type, each still merging onto the same underlying raw
/// elements when their address ranges overlap.
pub struct TransferGroup<T: UserValue> {
    members: Vec<Arc<Mutex<dyn NDRegisterAccessor<T>>>>,
    member_ids: HashSet<TransferElementId>,
    raw_elements: Vec<Arc<Mutex<RawAccessor>>>,
}

impl<T: UserValue> TransferGroup<T> {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            member_ids: HashSet::new(),
            raw_elements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of distinct raw elements the group currently issues transfers against, after
    /// merging. Exposed mainly for tests asserting the merge actually happened.
    pub fn raw_element_count(&self) -> usize {
        self.raw_elements.len()
    }

    /// Adds `accessor` to the group, merging its raw elements into any existing, mergeable raw
    /// range already owned by the group. Adding the same accessor (by id) twice is a no-op.
    pub fn add_accessor(&mut self, accessor: Arc<Mutex<dyn NDRegisterAccessor<T>>>) {
        let id = accessor.lock().unwrap_or_else(|e| e.into_inner()).id();
        if !self.member_ids.insert(id) {
            return;
        }
        let raws = accessor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .raw_elements();
        self.members.push(accessor);
        for incoming in raws {
            self.merge_in(incoming);
        }
    }

    /// Folds `incoming` into the first existing raw element it is mergeable with (growing that
    /// element's address range and re-pointing every current member that referenced `incoming`),
    /// or appends it as a new raw element if none matched.
    ///
    /// A raw element bridging two already-disjoint group ranges at once is not merged further in
    /// this pass; it would need a second `add_accessor` call to fold in, which matches how the
    /// original discovers merges incrementally rather than via a global interval union.
    fn merge_in(&mut self, incoming: Arc<Mutex<RawAccessor>>) {
        for existing in &self.raw_elements {
            let mergeable = {
                let e = existing.lock().unwrap_or_else(|e| e.into_inner());
                let i = incoming.lock().unwrap_or_else(|e| e.into_inner());
                Arc::ptr_eq(existing, &incoming) || e.is_mergeable(&i)
            };
            if !mergeable {
                continue;
            }
            if Arc::ptr_eq(existing, &incoming) {
                return;
            }

            let old_start = existing.lock().unwrap_or_else(|e| e.into_inner()).start_address();
            let incoming_start = incoming.lock().unwrap_or_else(|e| e.into_inner()).start_address();
            let (new_start, new_len_words) = {
                let e = existing.lock().unwrap_or_else(|e| e.into_inner());
                let i = incoming.lock().unwrap_or_else(|e| e.into_inner());
                let start = e.start_address().min(i.start_address());
                let end = e.end_address().max(i.end_address());
                (start, ((end - start) / 4) as usize)
            };
            existing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .change_address(new_start, new_len_words);

            // `existing`'s start address may have just moved down (the incoming range sits below
            // it). Every member that already pointed at `existing` has a word offset relative to
            // the *old* start, so it needs shifting by the same number of words the start moved,
            // or it would silently read/write its neighbour's slice after the merge.
            let shift_words = ((old_start - new_start) / 4) as usize;

            for member in &self.members {
                let mut guard = member.lock().unwrap_or_else(|e| e.into_inner());
                let owns_incoming = guard
                    .raw_elements()
                    .iter()
                    .any(|r| Arc::ptr_eq(r, &incoming));
                let owns_existing = guard
                    .raw_elements()
                    .iter()
                    .any(|r| Arc::ptr_eq(r, existing));
                if owns_incoming {
                    let word_offset = ((incoming_start - new_start) / 4) as usize;
                    guard.set_raw_elements(vec![Arc::clone(existing)], word_offset);
                } else if owns_existing && shift_words > 0 {
                    let word_offset = guard.raw_word_offset() + shift_words;
                    guard.set_raw_elements(vec![Arc::clone(existing)], word_offset);
                }
            }
            return;
        }
        self.raw_elements.push(incoming);
    }

    /// Runs all `pre_read`, then one `do_read_transfer` per (merged) raw element, then all
    /// `post_read` — in that strict order, with members and raw elements visited in insertion
    /// order.
    pub fn read(&mut self) -> Result<()> {
        for member in &self.members {
            member.lock().unwrap_or_else(|e| e.into_inner()).pre_read()?;
        }
        for raw in &self.raw_elements {
            raw.lock().unwrap_or_else(|e| e.into_inner()).do_read_transfer()?;
        }
        let version = VersionNumber::new();
        for member in &self.members {
            member
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .post_read(version)?;
        }
        Ok(())
    }

    /// Runs all `pre_write`, then one `do_write_transfer` per raw element, then all `post_write`.
    /// Returns `true` if any raw element reported a lost (overwritten) pending write.
    pub fn write(&mut self, version: VersionNumber) -> Result<bool> {
        for member in &self.members {
            member.lock().unwrap_or_else(|e| e.into_inner()).pre_write()?;
        }
        let mut lost = false;
        for raw in &self.raw_elements {
            lost |= raw
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .do_write_transfer(version)?;
        }
        for member in &self.members {
            member.lock().unwrap_or_else(|e| e.into_inner()).post_write()?;
        }
        Ok(lost)
    }
}

impl<T: UserValue> Default for TransferGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UserValue> std::fmt::Debug for TransferGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferGroup")
            .field("members", &self.members.len())
            .field("raw_elements", &self.raw_elements.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::{Backend, RegisterCatalogue};
    use crate::converter::FixedPointConverter;
    use crate::cooked::CookedAccessor;
    use transfer_types::{AccessModeFlags, RegisterPath};

    fn cooked_at(backend: &Arc<dyn Backend>, address: u32) -> Arc<Mutex<dyn NDRegisterAccessor<i32>>> {
        let raw = Arc::new(Mutex::new(RawAccessor::new(
            Arc::clone(backend),
            RegisterPath::new(format!("/r{address:#x}")),
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
            RegisterPath::new(format!("/r{address:#x}")),
            AccessModeFlags::empty(),
            true,
            true,
        )))
    }

    #[test]
    fn adjacent_accessors_merge_into_one_raw_transfer() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        backend.write(0, 0x10, &[11]).unwrap();
        backend.write(0, 0x14, &[22]).unwrap();

        let mut group = TransferGroup::<i32>::new();
        group.add_accessor(cooked_at(&backend, 0x10));
        group.add_accessor(cooked_at(&backend, 0x14));
        assert_eq!(group.raw_element_count(), 1);

        group.read().unwrap();
    }

    #[test]
    fn disjoint_accessors_stay_separate_raw_transfers() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();

        let mut group = TransferGroup::<i32>::new();
        group.add_accessor(cooked_at(&backend, 0x10));
        group.add_accessor(cooked_at(&backend, 0x100));
        assert_eq!(group.raw_element_count(), 2);
    }

    #[test]
    fn adding_the_same_accessor_twice_is_idempotent() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        let accessor = cooked_at(&backend, 0x10);

        let mut group = TransferGroup::<i32>::new();
        group.add_accessor(Arc::clone(&accessor));
        group.add_accessor(Arc::clone(&accessor));
        assert_eq!(group.len(), 1);
        assert_eq!(group.raw_element_count(), 1);
    }

    #[test]
    fn merging_a_lower_address_shifts_the_earlier_members_offset() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        backend.write(0, 0x04, &[44]).unwrap();
        backend.write(0, 0x00, &[55]).unwrap();

        let higher = cooked_at(&backend, 0x04);
        let lower = cooked_at(&backend, 0x00);

        let mut group = TransferGroup::<i32>::new();
        group.add_accessor(Arc::clone(&higher));
        group.add_accessor(Arc::clone(&lower));
        assert_eq!(group.raw_element_count(), 1);

        group.read().unwrap();

        assert_eq!(higher.lock().unwrap().channel(0)[0], 44);
        assert_eq!(lower.lock().unwrap().channel(0)[0], 55);
    }

    #[test]
    fn merged_members_read_their_own_slice_after_the_group_transfer() {
        let backend: Arc<dyn Backend> = Arc::new(DummyBackend::new(RegisterCatalogue::new()));
        backend.open().unwrap();
        backend.write(0, 0x10, &[11]).unwrap();
        backend.write(0, 0x14, &[22]).unwrap();

        let first = cooked_at(&backend, 0x10);
        let second = cooked_at(&backend, 0x14);

        let mut group = TransferGroup::<i32>::new();
        group.add_accessor(Arc::clone(&first));
        group.add_accessor(Arc::clone(&second));
        group.read().unwrap();

        assert_eq!(first.lock().unwrap().channel(0)[0], 11);
        assert_eq!(second.lock().unwrap().channel(0)[0], 22);
    }
}
