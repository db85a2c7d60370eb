//! The debug-pipe listener: a named, in-process endpoint.
//!
//! A [`PipeServer`] is created through [`PipeRegistry::listen`] and stays
//! registered until its last handle is dropped. Connectors are paired with
//! it by name; each successful pairing invokes the acceptor callback with
//! the new server-side connection.
//!
//! Lifecycle notes:
//!
//! - Cloning a `PipeServer` clones a handle to the same listener; the
//!   listener is finalized when the last handle drops. Finalization
//!   removes the registry entry and releases the registry use count,
//!   exactly once per successful `listen`.
//! - [`disconnect`](PipeServer::disconnect) only gates *future* connection
//!   attempts. The name stays taken until the listener is finalized, and
//!   connections already handed out are unaffected.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::address;
use crate::connection::ServerConnection;
use crate::error::{PipeError, Result};
use crate::registry::{PipeRegistry, RegistryGuard, RegistryState};

/// Acceptor callback invoked for each new connection.
pub type AcceptorFn = Box<dyn FnMut(&PipeServer, ServerConnection)>;

/// State every listener kind shares: its address, the acceptor slot, and
/// the auth-mechanism restriction forwarded to new server transports.
pub(crate) struct ListenerBase {
    address: String,
    acceptor: RefCell<Option<AcceptorFn>>,
    auth_mechanisms: RefCell<Option<Vec<String>>>,
}

impl ListenerBase {
    fn new(address: String) -> Self {
        Self {
            address,
            acceptor: RefCell::new(None),
            auth_mechanisms: RefCell::new(None),
        }
    }
}

pub(crate) struct ServerInner {
    base: ListenerBase,
    name: String,
    disconnected: Cell<bool>,
    registry: Rc<RefCell<RegistryState>>,
}

impl ServerInner {
    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.get()
    }

    pub(crate) fn auth_mechanisms(&self) -> Option<Vec<String>> {
        self.base.auth_mechanisms.borrow().clone()
    }
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        // Finalization order: erase the name entry, then release the use
        // count taken by `listen`. Erasing first means no window where the
        // map can hold a dangling entry.
        let mut state = self.registry.borrow_mut();
        state.remove(&self.name);
        state.release();
        tracing::debug!("debug-pipe listener '{}' finalized", self.name);
    }
}

/// Handle to a registered debug-pipe listener.
#[derive(Clone)]
pub struct PipeServer {
    inner: Rc<ServerInner>,
}

impl std::fmt::Debug for PipeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeServer")
            .field("name", &self.inner.name)
            .field("disconnected", &self.inner.disconnected.get())
            .finish_non_exhaustive()
    }
}

impl PipeServer {
    /// Create and register a listener. Called via [`PipeRegistry::listen`].
    pub(crate) fn create(registry: &PipeRegistry, name: &str) -> Result<Self> {
        let state = registry.state().clone();

        // The guard unwinds the acquisition on every early return below.
        let guard = RegistryGuard::acquire(state.clone());

        if state.borrow().contains(name) {
            return Err(PipeError::AddressInUse(name.to_string()));
        }

        let inner = Rc::new(ServerInner {
            base: ListenerBase::new(address::format_address(name)),
            name: name.to_string(),
            disconnected: Cell::new(false),
            registry: state.clone(),
        });

        state
            .borrow_mut()
            .register(name.to_string(), Rc::downgrade(&inner));

        // From here the listener's finalizer owns the matching release.
        guard.disarm();

        tracing::debug!("debug-pipe listener '{}' registered", name);
        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Rc<ServerInner>) -> Self {
        Self { inner }
    }

    /// The registry key this listener is registered under.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The listener's `debug-pipe:name=<name>` address.
    #[inline]
    pub fn address(&self) -> &str {
        &self.inner.base.address
    }

    /// Whether [`disconnect`](Self::disconnect) has been called.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.inner.is_disconnected()
    }

    /// Stop accepting new connections.
    ///
    /// The listener stays registered — its name remains taken until the
    /// last handle drops — and connections already established keep
    /// working. Only future [`connect`](PipeRegistry::connect) calls are
    /// refused, with `NoServer`.
    pub fn disconnect(&self) {
        self.inner.disconnected.set(true);
        tracing::debug!("debug-pipe listener '{}' disconnected", self.inner.name);
    }

    /// Install the acceptor invoked for each new connection.
    ///
    /// The callback receives the listener and the server-side connection.
    /// A connection the callback does not keep is torn down when the
    /// callback returns, and the connecting client reads an immediate
    /// disconnect.
    pub fn set_acceptor(&self, acceptor: impl FnMut(&PipeServer, ServerConnection) + 'static) {
        *self.inner.base.acceptor.borrow_mut() = Some(Box::new(acceptor));
    }

    /// Remove the acceptor; subsequent connections are dropped unaccepted.
    pub fn clear_acceptor(&self) {
        *self.inner.base.acceptor.borrow_mut() = None;
    }

    /// Restrict the auth mechanisms forwarded to new server transports.
    pub fn set_auth_mechanisms(&self, mechanisms: &[&str]) {
        let mechanisms = mechanisms.iter().map(|m| m.to_string()).collect();
        *self.inner.base.auth_mechanisms.borrow_mut() = Some(mechanisms);
    }

    /// The configured auth-mechanism restriction, if any.
    pub fn auth_mechanisms(&self) -> Option<Vec<String>> {
        self.inner.auth_mechanisms()
    }

    /// Hand a new connection to the acceptor, if one is installed.
    ///
    /// The acceptor is taken out of its slot for the call, so a reentrant
    /// `set_acceptor` from inside the callback wins over the old one; the
    /// old acceptor is only put back if the slot is still empty afterward.
    /// The caller (the establisher) holds a strong handle to this listener
    /// across the call, so the listener outlives the callback even if the
    /// callback drops every other handle.
    pub(crate) fn deliver(&self, connection: ServerConnection) {
        let taken = self.inner.base.acceptor.borrow_mut().take();
        match taken {
            Some(mut acceptor) => {
                acceptor(self, connection);
                let slot = &self.inner.base.acceptor;
                if slot.borrow().is_none() {
                    *slot.borrow_mut() = Some(acceptor);
                }
            }
            None => {
                tracing::debug!(
                    "no acceptor on '{}', dropping new connection",
                    self.inner.name
                );
                drop(connection);
            }
        }
    }
}
