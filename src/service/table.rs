//! Service table and setup-time validation

use core::fmt;

use crate::config::{Word, MAX_FORWARDED_ARGS};
use crate::dispatch::DispatchError;

use super::entry::{SecureService, ServiceAddr, ServiceEntry};

/// A service id known to be below a table's capacity.
///
/// This is a newtype to prevent using arbitrary words as table indices.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct ServiceId(u32);

impl ServiceId {
    /// Create a service id.
    ///
    /// Returns None if `raw` is not below `capacity`.
    #[inline]
    pub fn new(raw: Word, capacity: usize) -> Option<Self> {
        if raw < capacity {
            u32::try_from(raw).ok().map(Self)
        } else {
            None
        }
    }

    /// Get the index value.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Configuration errors caught while assembling a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// The id does not fit in the table.
    IdOutOfRange { id: u32, capacity: usize },
    /// The id is already taken.
    DuplicateId { id: u32 },
    /// A raw entry address of zero.
    NullEntry { id: u32 },
    /// The service takes more words than a call can forward.
    ArityTooLarge { id: u32, arity: usize },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdOutOfRange { id, capacity } => {
                write!(f, "service id {} out of range (capacity {})", id, capacity)
            }
            Self::DuplicateId { id } => write!(f, "service id {} registered twice", id),
            Self::NullEntry { id } => write!(f, "service id {} has a null entry point", id),
            Self::ArityTooLarge { id, arity } => write!(
                f,
                "service id {} takes {} words, at most {} can be forwarded",
                id, arity, MAX_FORWARDED_ARGS
            ),
        }
    }
}

/// Assembles a [`ServiceTable`] during secure-world startup.
pub struct ServiceTableBuilder<const N: usize> {
    slots: [Option<ServiceEntry>; N],
}

impl<const N: usize> ServiceTableBuilder<N> {
    pub const fn new() -> Self {
        Self { slots: [None; N] }
    }

    /// Register a typed service under `id`.
    pub fn register<F: SecureService>(
        self,
        id: u32,
        name: &'static str,
        service: F,
    ) -> Result<Self, TableError> {
        self.insert(id, ServiceEntry::new(name, service.entry(), F::ARITY))
    }

    /// Register a service by raw address, as found in a linker-generated table.
    ///
    /// # Safety
    /// A non-zero `addr` must be the entry point of an `extern "C"` function
    /// taking `arity` words and returning one word.
    pub unsafe fn register_raw(
        self,
        id: u32,
        name: &'static str,
        addr: usize,
        arity: usize,
    ) -> Result<Self, TableError> {
        if addr == 0 {
            return Err(TableError::NullEntry { id });
        }
        // SAFETY: addr is non-zero and the caller vouches for the signature
        let entry = unsafe { core::mem::transmute::<usize, ServiceAddr>(addr) };
        self.insert(id, ServiceEntry::new(name, entry, arity))
    }

    fn insert(mut self, id: u32, entry: ServiceEntry) -> Result<Self, TableError> {
        let index = id as usize;
        if index >= N {
            return Err(TableError::IdOutOfRange { id, capacity: N });
        }
        if entry.arity() > MAX_FORWARDED_ARGS {
            return Err(TableError::ArityTooLarge {
                id,
                arity: entry.arity(),
            });
        }
        if self.slots[index].is_some() {
            return Err(TableError::DuplicateId { id });
        }
        self.slots[index] = Some(entry);
        Ok(self)
    }

    /// Freeze the table. Unregistered ids resolve to the invalid placeholder.
    pub fn build(self) -> ServiceTable<N> {
        ServiceTable {
            entries: self.slots.map(|slot| slot.unwrap_or(ServiceEntry::INVALID)),
        }
    }
}

impl<const N: usize> Default for ServiceTableBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable id to entry point mapping.
///
/// `N` is the number of service ids; ids `>= N` are unknown.
pub struct ServiceTable<const N: usize> {
    entries: [ServiceEntry; N],
}

impl<const N: usize> ServiceTable<N> {
    /// Number of service ids.
    pub const CAPACITY: usize = N;

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Resolve a raw id read from the caller.
    pub fn lookup(&self, raw: Word) -> Result<&ServiceEntry, DispatchError> {
        ServiceId::new(raw, N)
            .map(|id| self.get(id))
            .ok_or(DispatchError::UnknownService { id: raw })
    }

    #[inline]
    pub fn get(&self, id: ServiceId) -> &ServiceEntry {
        &self.entries[id.index()]
    }

    /// Returns true if `raw` names a registered service.
    pub fn is_registered(&self, raw: Word) -> bool {
        self.lookup(raw).map(|e| e.is_valid()).unwrap_or(false)
    }

    /// Registered services with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ServiceId, &ServiceEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_valid())
            .map(|(i, e)| (ServiceId(i as u32), e))
    }

    pub fn registered_count(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Add2 = extern "C" fn(Word, Word) -> Word;

    extern "C" fn add2(a: Word, b: Word) -> Word {
        a.wrapping_add(b)
    }

    extern "C" fn chip_revision() -> Word {
        2
    }

    fn table() -> ServiceTable<4> {
        ServiceTableBuilder::new()
            .register(0, "add2", add2 as Add2)
            .and_then(|b| b.register(2, "chip_revision", chip_revision as extern "C" fn() -> Word))
            .unwrap()
            .build()
    }

    #[test]
    fn test_service_id_bounds() {
        assert_eq!(ServiceId::new(3, 4).map(ServiceId::index), Some(3));
        assert!(ServiceId::new(4, 4).is_none());
        assert!(ServiceId::new(Word::MAX, 4).is_none());
    }

    #[test]
    fn test_lookup() {
        let table = table();
        assert_eq!(table.lookup(0).unwrap().name(), "add2");
        assert_eq!(table.lookup(0).unwrap().arity(), 2);
        assert_eq!(
            table.lookup(4).unwrap_err(),
            DispatchError::UnknownService { id: 4 }
        );
    }

    #[test]
    fn test_unregistered_slot_is_placeholder() {
        let table = table();
        let entry = table.lookup(1).unwrap();
        assert!(!entry.is_valid());
        assert!(!table.is_registered(1));
        assert!(table.is_registered(2));
        assert_eq!(table.registered_count(), 2);

        let ids: Vec<usize> = table.iter().map(|(id, _)| id.index()).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_setup_errors() {
        let err = ServiceTableBuilder::<2>::new()
            .register(2, "add2", add2 as Add2)
            .err();
        assert_eq!(err, Some(TableError::IdOutOfRange { id: 2, capacity: 2 }));

        let err = ServiceTableBuilder::<2>::new()
            .register(0, "add2", add2 as Add2)
            .and_then(|b| b.register(0, "again", add2 as Add2))
            .err();
        assert_eq!(err, Some(TableError::DuplicateId { id: 0 }));

        // SAFETY: the null address is rejected before use
        let err = unsafe { ServiceTableBuilder::<2>::new().register_raw(1, "null", 0, 0) }.err();
        assert_eq!(err, Some(TableError::NullEntry { id: 1 }));

        let addr = add2 as Add2 as usize;
        // SAFETY: add2 is an extern "C" function; the arity is rejected first
        let err = unsafe { ServiceTableBuilder::<2>::new().register_raw(1, "wide", addr, 12) }.err();
        assert_eq!(err, Some(TableError::ArityTooLarge { id: 1, arity: 12 }));
    }

    #[test]
    fn test_register_raw() {
        let addr = add2 as Add2 as usize;
        // SAFETY: add2 is an extern "C" fn taking two words
        let table = unsafe { ServiceTableBuilder::<1>::new().register_raw(0, "add2", addr, 2) }
            .unwrap()
            .build();
        assert_eq!(table.lookup(0).unwrap().address(), addr);
    }
}
