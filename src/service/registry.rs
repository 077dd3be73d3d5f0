//! Process-wide service table
//!
//! The secure world installs its table once during startup; every service
//! call afterwards reads it without locking.

use core::fmt;

use spin::Once;

use crate::dispatch::Dispatcher;

use super::table::ServiceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A table was installed earlier; the first one stays.
    AlreadyInstalled,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "service table already installed"),
        }
    }
}

/// Holder for the one service table of the secure world.
///
/// ```ignore
/// static SERVICES: ServiceRegistry<MAX_SERVICES> = ServiceRegistry::new();
/// ```
pub struct ServiceRegistry<const N: usize> {
    table: Once<ServiceTable<N>>,
}

impl<const N: usize> ServiceRegistry<N> {
    pub const fn new() -> Self {
        Self { table: Once::new() }
    }

    /// Install the table. Only the first call succeeds.
    pub fn install(&self, table: ServiceTable<N>) -> Result<&ServiceTable<N>, RegistryError> {
        let mut installed = false;
        let table = self.table.call_once(|| {
            installed = true;
            table
        });
        if installed {
            log::info!("secure service table installed ({} services)", table.registered_count());
            Ok(table)
        } else {
            log::error!("{}", RegistryError::AlreadyInstalled);
            Err(RegistryError::AlreadyInstalled)
        }
    }

    pub fn table(&self) -> Option<&ServiceTable<N>> {
        self.table.get()
    }

    pub fn is_installed(&self) -> bool {
        self.table.is_completed()
    }

    /// Dispatcher over the installed table.
    pub fn dispatcher(&self) -> Option<Dispatcher<'_, N>> {
        self.table().map(Dispatcher::new)
    }
}

impl<const N: usize> Default for ServiceRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Word;
    use crate::dispatch::SliceArgs;
    use crate::service::ServiceTableBuilder;

    extern "C" fn double(a: Word) -> Word {
        a * 2
    }

    fn table() -> ServiceTable<2> {
        ServiceTableBuilder::new()
            .register(1, "double", double as extern "C" fn(Word) -> Word)
            .unwrap()
            .build()
    }

    #[test]
    fn test_install_once() {
        static REGISTRY: ServiceRegistry<2> = ServiceRegistry::new();

        assert!(REGISTRY.table().is_none());
        assert!(REGISTRY.dispatcher().is_none());

        assert!(REGISTRY.install(table()).is_ok());
        assert!(REGISTRY.is_installed());
        assert_eq!(
            REGISTRY.install(ServiceTableBuilder::new().build()).err(),
            Some(RegistryError::AlreadyInstalled)
        );

        // The first table stays in place
        assert!(REGISTRY.table().unwrap().is_registered(1));
    }

    #[test]
    fn test_dispatch_through_registry() {
        static REGISTRY: ServiceRegistry<2> = ServiceRegistry::new();
        REGISTRY.install(table()).unwrap();

        let dispatcher = REGISTRY.dispatcher().unwrap();
        assert_eq!(dispatcher.dispatch(2, SliceArgs::new(&[1, 21])), 42);
    }
}
