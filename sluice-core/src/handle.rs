use crate::{Connection, ConnectionSource, Error, Result, error::execution, util::attach};
use std::{
    fmt, mem,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// How the holder of a [`Lease`] terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Error or cancellation. Under a transaction it forces a rollback.
    Failure,
}

type Opener<C> = Box<dyn FnOnce() -> Result<C> + Send>;

enum State<C> {
    Unopened(Opener<C>),
    Open(C),
    Closed,
}

struct Shared<C> {
    counter: AtomicUsize,
    failed: AtomicBool,
    transacted: bool,
    state: Mutex<State<C>>,
}

/// A physical connection shared by reference count.
///
/// The handle moves from unopened to open on the first [`ConnectionHandle::acquire`] and
/// to closed when the last [`Lease`] is released. A transacted handle begins a
/// transaction when it opens and commits (or rolls back, if any holder failed) right
/// before the physical close. Cloning the handle does not acquire it.
pub struct ConnectionHandle<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> ConnectionHandle<C> {
    /// A handle that opens its connection with `opener` and runs without a transaction.
    pub fn new(opener: impl FnOnce() -> Result<C> + Send + 'static) -> Self {
        Self::with_opener(Box::new(opener), false)
    }

    /// A handle whose holders share one transaction.
    pub fn transacted(opener: impl FnOnce() -> Result<C> + Send + 'static) -> Self {
        Self::with_opener(Box::new(opener), true)
    }

    pub(crate) fn from_source(
        source: &Arc<dyn ConnectionSource<Connection = C>>,
        transacted: bool,
    ) -> Self {
        let source = source.clone();
        Self::with_opener(Box::new(move || source.connection()), transacted)
    }

    fn with_opener(opener: Opener<C>, transacted: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                counter: AtomicUsize::new(0),
                failed: AtomicBool::new(false),
                transacted,
                state: Mutex::new(State::Unopened(opener)),
            }),
        }
    }

    pub fn is_transacted(&self) -> bool {
        self.shared.transacted
    }

    /// Number of outstanding leases.
    pub fn counter(&self) -> usize {
        self.shared.counter.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.lock().as_deref(), Ok(State::Open(..)))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.lock().as_deref(), Ok(State::Closed))
    }

    /// Whether `other` refers to the same physical connection.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Take a lease on the connection, opening it (and beginning the transaction) if needed.
    pub fn acquire(&self) -> Result<Lease<C>> {
        let mut state = self.lock()?;
        match mem::replace(&mut *state, State::Closed) {
            State::Open(connection) => {
                *state = State::Open(connection);
                let counter = self.shared.counter.fetch_add(1, Ordering::AcqRel) + 1;
                log::debug!("Connection acquired again, {} leases", counter);
            }
            State::Unopened(opener) => {
                let mut connection =
                    opener().map_err(|e| execution(e, "Could not obtain a connection"))?;
                if self.shared.transacted
                    && let Err(e) = connection.begin()
                {
                    let e = execution(e, "Could not begin the transaction");
                    return Err(match connection.close() {
                        Ok(()) => e,
                        Err(c) => attach(e, c),
                    });
                }
                *state = State::Open(connection);
                self.shared.counter.store(1, Ordering::Release);
                log::debug!(
                    "Connection opened{}",
                    if self.shared.transacted {
                        " with a transaction"
                    } else {
                        ""
                    }
                );
            }
            State::Closed => {
                return Err(execution(
                    Error::msg("The connection was already closed"),
                    "Cannot acquire the connection",
                ));
            }
        }
        Ok(Lease {
            handle: self.clone(),
            released: false,
        })
    }

    /// Run `f` on the open physical connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut C) -> Result<R>) -> Result<R> {
        let mut state = self.lock()?;
        match &mut *state {
            State::Open(connection) => f(connection),
            _ => Err(Error::msg("The connection is not open")),
        }
    }

    fn release(&self, outcome: Outcome) -> Result<()> {
        let mut state = self.lock()?;
        if outcome == Outcome::Failure {
            self.shared.failed.store(true, Ordering::Release);
        }
        let remaining = match self.shared.counter.load(Ordering::Acquire) {
            0 => {
                return Err(Error::msg(
                    "The connection was released more times than it was acquired",
                ));
            }
            n => n - 1,
        };
        self.shared.counter.store(remaining, Ordering::Release);
        if remaining > 0 {
            log::debug!("Connection released, {} leases left", remaining);
            return Ok(());
        }
        let State::Open(connection) = mem::replace(&mut *state, State::Closed) else {
            return Err(Error::msg("Released a connection that is not open"));
        };
        self.finish(connection, outcome)
    }

    fn finish(&self, mut connection: C, outcome: Outcome) -> Result<()> {
        let mut result = Ok(());
        if self.shared.transacted {
            result = if self.shared.failed.load(Ordering::Acquire) {
                log::debug!("Rolling back the transaction");
                match connection.rollback() {
                    Ok(()) if outcome == Outcome::Success => Err(execution(
                        Error::msg("Another query sharing the transaction failed"),
                        "The transaction was rolled back",
                    )),
                    Ok(()) => Ok(()),
                    Err(e) => Err(execution(e, "Could not roll back the transaction")),
                }
            } else {
                log::debug!("Committing the transaction");
                connection.commit().or_else(|e| {
                    let e = execution(e, "Could not commit the transaction");
                    match connection.rollback() {
                        Ok(()) => Err(e),
                        Err(r) => Err(attach(e, r)),
                    }
                })
            };
        }
        let closed = connection
            .close()
            .map_err(|e| execution(e, "Could not close the connection"));
        log::debug!("Connection closed");
        match (result, closed) {
            (Ok(()), closed) => closed,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(c)) => Err(attach(e, c)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<C>>> {
        self.shared
            .state
            .lock()
            .map_err(|_| Error::msg("The connection handle lock was poisoned"))
    }
}

impl<C: Connection> Clone for ConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Connection> fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("counter", &self.counter())
            .field("transacted", &self.shared.transacted)
            .finish()
    }
}

/// One acquisition of a [`ConnectionHandle`].
///
/// Released exactly once: explicitly through [`Lease::release`], or as a failure
/// when dropped unreleased.
pub struct Lease<C: Connection> {
    handle: ConnectionHandle<C>,
    released: bool,
}

impl<C: Connection> Lease<C> {
    pub fn handle(&self) -> &ConnectionHandle<C> {
        &self.handle
    }

    pub fn with_connection<R>(&self, f: impl FnOnce(&mut C) -> Result<R>) -> Result<R> {
        self.handle.with_connection(f)
    }

    /// Give the lease back. The last release commits or rolls back and closes the connection.
    pub fn release(mut self, outcome: Outcome) -> Result<()> {
        self.released = true;
        self.handle.release(outcome)
    }
}

impl<C: Connection> Drop for Lease<C> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = self.handle.release(Outcome::Failure) {
                log::error!("{:#}", e);
            }
        }
    }
}
