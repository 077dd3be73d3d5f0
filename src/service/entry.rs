//! Service entry points

use crate::config::{Word, DISPATCH_FAILED};

/// Type-erased address of a secure service.
///
/// The real signature is `extern "C" fn(Word, ...) -> Word` with up to
/// [`MAX_FORWARDED_ARGS`](crate::config::MAX_FORWARDED_ARGS) words. Being a
/// function pointer, it is never null.
pub type ServiceAddr = unsafe extern "C" fn() -> Word;

/// A secure service function that can be placed in a table.
pub trait SecureService: Copy {
    /// Number of words the service takes.
    const ARITY: usize;

    /// Erase the signature.
    fn entry(self) -> ServiceAddr;
}

macro_rules! secure_service_arity {
    ($arity:expr; $($arg:ident),*) => {
        impl SecureService for extern "C" fn($($arg: Word),*) -> Word {
            const ARITY: usize = $arity;

            fn entry(self) -> ServiceAddr {
                // SAFETY: Function pointers share one representation. The
                // dispatcher only calls through the erased pointer with the
                // C calling convention.
                unsafe { core::mem::transmute::<Self, ServiceAddr>(self) }
            }
        }

        impl SecureService for unsafe extern "C" fn($($arg: Word),*) -> Word {
            const ARITY: usize = $arity;

            fn entry(self) -> ServiceAddr {
                // SAFETY: As above
                unsafe { core::mem::transmute::<Self, ServiceAddr>(self) }
            }
        }
    };
}

secure_service_arity!(0;);
secure_service_arity!(1; a0);
secure_service_arity!(2; a0, a1);
secure_service_arity!(3; a0, a1, a2);
secure_service_arity!(4; a0, a1, a2, a3);
secure_service_arity!(5; a0, a1, a2, a3, a4);
secure_service_arity!(6; a0, a1, a2, a3, a4, a5);
secure_service_arity!(7; a0, a1, a2, a3, a4, a5, a6);
secure_service_arity!(8; a0, a1, a2, a3, a4, a5, a6, a7);
secure_service_arity!(9; a0, a1, a2, a3, a4, a5, a6, a7, a8);

/// Placeholder behind every unregistered service id.
pub extern "C" fn invalid_service() -> Word {
    log::error!("call to unregistered secure service");
    DISPATCH_FAILED
}

/// One slot of a service table.
#[derive(Debug, Clone, Copy)]
pub struct ServiceEntry {
    name: &'static str,
    entry: ServiceAddr,
    arity: usize,
    registered: bool,
}

impl ServiceEntry {
    /// Entry used for ids that were never registered.
    pub const INVALID: Self = Self {
        name: "invalid",
        entry: invalid_service,
        arity: 0,
        registered: false,
    };

    pub(crate) const fn new(name: &'static str, entry: ServiceAddr, arity: usize) -> Self {
        Self {
            name,
            entry,
            arity,
            registered: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entry(&self) -> ServiceAddr {
        self.entry
    }

    /// Number of words the service declared at registration.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Raw entry address.
    pub fn address(&self) -> usize {
        self.entry as usize
    }

    /// Returns true unless this is the [`invalid_service`] placeholder.
    pub fn is_valid(&self) -> bool {
        self.registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn add2(a: Word, b: Word) -> Word {
        a.wrapping_add(b)
    }

    extern "C" fn version() -> Word {
        3
    }

    #[test]
    fn test_arity_from_signature() {
        assert_eq!(<extern "C" fn(Word, Word) -> Word as SecureService>::ARITY, 2);
        assert_eq!(<extern "C" fn() -> Word as SecureService>::ARITY, 0);
        assert_eq!(
            <unsafe extern "C" fn(Word, Word, Word, Word, Word, Word, Word, Word, Word) -> Word
                as SecureService>::ARITY,
            9
        );
    }

    #[test]
    fn test_entry_keeps_address() {
        let f = add2 as extern "C" fn(Word, Word) -> Word;
        assert_eq!(f.entry() as usize, f as usize);
    }

    #[test]
    fn test_invalid_placeholder() {
        assert!(!ServiceEntry::INVALID.is_valid());
        assert_eq!(invalid_service(), DISPATCH_FAILED);

        let f = version as extern "C" fn() -> Word;
        assert!(ServiceEntry::new("version", f.entry(), 0).is_valid());
    }

    #[test]
    fn test_registered_placeholder_address_is_valid() {
        // Validity comes from registration, not from the entry address
        let f = invalid_service as extern "C" fn() -> Word;
        let entry = ServiceEntry::new("fallback", f.entry(), 0);
        assert!(entry.is_valid());
        assert!(!ServiceEntry::INVALID.is_valid());
    }
}
