//! Named listener registry.
//!
//! The registry maps listener names to live listeners and gates its own
//! storage behind a use count: the map exists exactly while at least one
//! listener is alive. Entries are non-owning (`Weak`) — a listener's final
//! drop removes its entry and releases the use count, so a registry with
//! no listeners always reads as "never allocated".
//!
//! The whole structure is `Rc`/`RefCell`-based and therefore `!Send`:
//! single-threaded access is a contract enforced by the compiler, not a
//! convention.
//!
//! # Example
//!
//! ```ignore
//! use loopwire::PipeRegistry;
//!
//! let registry = PipeRegistry::new();
//! let server = registry.listen("echo")?;
//! server.set_acceptor(|_server, conn| {
//!     // keep `conn` somewhere, or let it drop to refuse the client
//! });
//! let client = registry.connect("echo")?;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::address;
use crate::error::Result;
use crate::establish;
use crate::server::{PipeServer, ServerInner};
use crate::transport::{ChannelPairFactory, InMemoryPairFactory, PipeTransport};

/// Inner registry state: the name map plus the use count that gates it.
///
/// Invariants: `entries.is_some()` exactly when `use_count > 0`; names are
/// unique. Violations of the release protocol are programming errors and
/// panic.
pub(crate) struct RegistryState {
    entries: Option<HashMap<String, Weak<ServerInner>>>,
    use_count: usize,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            entries: None,
            use_count: 0,
        }
    }

    /// Take a use-count reference, allocating the map on the 0 -> 1
    /// transition.
    pub(crate) fn acquire(&mut self) {
        if self.use_count == 0 {
            debug_assert!(self.entries.is_none());
            self.entries = Some(HashMap::new());
        }
        self.use_count += 1;
    }

    /// Drop a use-count reference, freeing the map when the count reaches
    /// zero.
    ///
    /// # Panics
    ///
    /// Panics if the registry is not currently allocated — an unbalanced
    /// release is a defect in the calling code, not a recoverable error.
    pub(crate) fn release(&mut self) {
        assert!(
            self.entries.is_some() && self.use_count > 0,
            "registry release without matching acquire"
        );
        self.use_count -= 1;
        if self.use_count == 0 {
            self.entries = None;
        }
    }

    /// Look up a live listener by name. A never-allocated registry reads
    /// as "not found".
    pub(crate) fn lookup(&self, name: &str) -> Option<Rc<ServerInner>> {
        self.entries.as_ref()?.get(name)?.upgrade()
    }

    /// Whether a name is currently registered.
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Insert a listener entry. The caller must have verified the name is
    /// free.
    pub(crate) fn register(&mut self, name: String, server: Weak<ServerInner>) {
        let entries = self
            .entries
            .as_mut()
            .expect("register on unallocated registry");
        let previous = entries.insert(name, server);
        debug_assert!(previous.is_none(), "duplicate listener name");
    }

    /// Remove a listener entry during finalization.
    pub(crate) fn remove(&mut self, name: &str) {
        if let Some(entries) = self.entries.as_mut() {
            entries.remove(name);
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.entries.is_some()
    }

    pub(crate) fn use_count(&self) -> usize {
        self.use_count
    }
}

/// Scoped registry acquisition for listener creation.
///
/// Releases the acquisition on drop unless [`disarm`](Self::disarm) was
/// called, so every early error return out of `listen` unwinds the
/// use count it took.
pub(crate) struct RegistryGuard {
    state: Rc<RefCell<RegistryState>>,
    armed: bool,
}

impl RegistryGuard {
    pub(crate) fn acquire(state: Rc<RefCell<RegistryState>>) -> Self {
        state.borrow_mut().acquire();
        Self { state, armed: true }
    }

    /// Hand responsibility for the matching release to the listener's
    /// finalizer.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        if self.armed {
            self.state.borrow_mut().release();
        }
    }
}

/// Handle to a named-listener registry.
///
/// Cloning the handle shares the same registry; the clone count has no
/// effect on the registry's allocated/unallocated lifecycle, which is
/// driven purely by live listeners.
#[derive(Clone)]
pub struct PipeRegistry {
    state: Rc<RefCell<RegistryState>>,
    factory: Rc<dyn ChannelPairFactory>,
}

impl PipeRegistry {
    /// Create a registry using the default in-memory pair factory.
    pub fn new() -> Self {
        Self::with_factory(InMemoryPairFactory::new())
    }

    /// Create a registry with a custom channel-pair factory.
    pub fn with_factory(factory: impl ChannelPairFactory + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(RegistryState::new())),
            factory: Rc::new(factory),
        }
    }

    /// Register a new listener under `name`.
    ///
    /// Fails with [`PipeError::AddressInUse`] if a live listener already
    /// holds the name; in that case the registry is left exactly as it
    /// was.
    ///
    /// [`PipeError::AddressInUse`]: crate::error::PipeError::AddressInUse
    pub fn listen(&self, name: &str) -> Result<PipeServer> {
        PipeServer::create(self, name)
    }

    /// Register a new listener from a `debug-pipe:name=<name>` address.
    pub fn listen_address(&self, addr: &str) -> Result<PipeServer> {
        self.listen(address::parse_address(addr)?)
    }

    /// Connect to the listener registered under `name`.
    ///
    /// On success the listener's acceptor callback has already been
    /// invoked with the server-side connection, and the returned client
    /// transport is ready for use. Fails with [`PipeError::NoServer`] if
    /// no live, non-disconnected listener holds the name.
    ///
    /// [`PipeError::NoServer`]: crate::error::PipeError::NoServer
    pub fn connect(&self, name: &str) -> Result<PipeTransport> {
        establish::establish(self, name)
    }

    /// Connect using a `debug-pipe:name=<name>` address.
    pub fn connect_address(&self, addr: &str) -> Result<PipeTransport> {
        self.connect(address::parse_address(addr)?)
    }

    /// Whether the registry storage currently exists (i.e. at least one
    /// listener is alive).
    pub fn is_allocated(&self) -> bool {
        self.state.borrow().is_allocated()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.state.borrow().use_count()
    }

    pub(crate) fn state(&self) -> &Rc<RefCell<RegistryState>> {
        &self.state
    }

    pub(crate) fn factory(&self) -> &dyn ChannelPairFactory {
        &*self.factory
    }
}

impl Default for PipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_allocates_on_first_use() {
        let mut state = RegistryState::new();
        assert!(!state.is_allocated());

        state.acquire();
        assert!(state.is_allocated());
        assert_eq!(state.use_count(), 1);

        state.acquire();
        assert_eq!(state.use_count(), 2);
    }

    #[test]
    fn test_release_frees_at_zero() {
        let mut state = RegistryState::new();
        state.acquire();
        state.acquire();

        state.release();
        assert!(state.is_allocated());

        state.release();
        assert!(!state.is_allocated());
        assert_eq!(state.use_count(), 0);
    }

    #[test]
    #[should_panic(expected = "registry release without matching acquire")]
    fn test_unbalanced_release_panics() {
        let mut state = RegistryState::new();
        state.release();
    }

    #[test]
    fn test_lookup_on_unallocated_is_not_found() {
        let state = RegistryState::new();
        assert!(state.lookup("anything").is_none());
        assert!(!state.contains("anything"));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let state = Rc::new(RefCell::new(RegistryState::new()));

        let guard = RegistryGuard::acquire(state.clone());
        assert_eq!(state.borrow().use_count(), 1);
        drop(guard);
        assert_eq!(state.borrow().use_count(), 0);
        assert!(!state.borrow().is_allocated());
    }

    #[test]
    fn test_disarmed_guard_keeps_acquisition() {
        let state = Rc::new(RefCell::new(RegistryState::new()));

        RegistryGuard::acquire(state.clone()).disarm();
        assert_eq!(state.borrow().use_count(), 1);
        assert!(state.borrow().is_allocated());
    }
}
