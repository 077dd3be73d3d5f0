//! Service Call Dispatcher
//!
//! Entry point for service calls from the normal world.
//!
//! # Security Considerations
//! - `argc` above [`MAX_ARGS`] is refused before the stream is read
//! - Service ids are checked against the table bounds
//! - Rejections are logged and returned as [`DISPATCH_FAILED`]

use core::fmt;

use crate::config::{Word, DISPATCH_FAILED, MAX_ARGS};
use crate::service::ServiceTable;

use super::cursor::{ArgSource, ArgumentCursor};
use super::marshal::marshal;
use super::transfer::transfer;

/// Why a call never reached a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// `argc` exceeds [`MAX_ARGS`].
    ArgumentCountExceeded { received: usize, permitted: usize },
    /// `argc` is zero, so there is no service id to read.
    MissingServiceId,
    /// The service id is not below the table capacity.
    UnknownService { id: Word },
    /// The stream holds fewer words than `argc` claims.
    TruncatedArguments { expected: usize, available: usize },
    /// Fewer words than the service declared at registration.
    TooFewArguments {
        id: Word,
        required: usize,
        received: usize,
    },
    /// The caller's stack spill is not readable normal-world memory.
    InvalidCallerStack,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentCountExceeded { received, permitted } => write!(
                f,
                "input arguments overflow: received {}, permitted {}",
                received, permitted
            ),
            Self::MissingServiceId => write!(f, "service call without a service id"),
            Self::UnknownService { id } => write!(f, "invalid service id {}", id),
            Self::TruncatedArguments {
                expected,
                available,
            } => write!(
                f,
                "argument stream truncated: expected {} words, {} available",
                expected, available
            ),
            Self::TooFewArguments {
                id,
                required,
                received,
            } => write!(
                f,
                "service {} takes {} arguments, received {}",
                id, required, received
            ),
            Self::InvalidCallerStack => write!(f, "caller stack outside normal-world memory"),
        }
    }
}

/// Dispatches service calls against one service table.
///
/// Holds no mutable state; any number of harts may share one instance.
#[derive(Clone, Copy)]
pub struct Dispatcher<'t, const N: usize> {
    table: &'t ServiceTable<N>,
}

impl<'t, const N: usize> Dispatcher<'t, N> {
    pub const fn new(table: &'t ServiceTable<N>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t ServiceTable<N> {
        self.table
    }

    /// Dispatch a service call at the privilege boundary.
    ///
    /// `argc` counts the service id, which is the first word of `args`. The
    /// result is the service's return word, or [`DISPATCH_FAILED`] if the call
    /// was rejected.
    pub fn dispatch<S: ArgSource>(&self, argc: usize, args: S) -> Word {
        match self.try_dispatch(argc, args) {
            Ok(ret) => ret,
            Err(err) => {
                log::error!("{}", err);
                DISPATCH_FAILED
            }
        }
    }

    /// Like [`Dispatcher::dispatch`], keeping the rejection reason.
    pub fn try_dispatch<S: ArgSource>(&self, argc: usize, args: S) -> Result<Word, DispatchError> {
        // Released on every return below
        let mut cursor = ArgumentCursor::new(args);

        if argc > MAX_ARGS {
            return Err(DispatchError::ArgumentCountExceeded {
                received: argc,
                permitted: MAX_ARGS,
            });
        }
        if argc == 0 || cursor.remaining() == 0 {
            return Err(DispatchError::MissingServiceId);
        }

        let raw_id = cursor.take();
        let argc = argc - 1;

        let entry = self.table.lookup(raw_id)?;

        if cursor.remaining() < argc {
            return Err(DispatchError::TruncatedArguments {
                expected: argc,
                available: cursor.remaining(),
            });
        }
        if argc < entry.arity() {
            return Err(DispatchError::TooFewArguments {
                id: raw_id,
                required: entry.arity(),
                received: argc,
            });
        }

        let frame = marshal(&mut cursor, argc);
        cursor.drain();

        log::trace!("service {} ({}), {} args", raw_id, entry.name(), argc);

        // SAFETY: table entries are extern "C" services taking at most
        // MAX_FORWARDED_ARGS words and no more than argc; unregistered ids
        // resolve to a zero-argument placeholder that ignores its arguments.
        Ok(unsafe { transfer(entry.entry(), &frame) })
    }
}
