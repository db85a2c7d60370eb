//! Connection establishment: pairing a connector with a registered
//! listener.
//!
//! `establish` is the connect side of the harness. It never suspends:
//! channel pairs are requested non-blocking and everything after that is
//! in-memory construction. Ownership flows linearly — raw halves into
//! transports, the server transport into the connection, the connection
//! into the acceptor — so every failure path drops exactly the resources
//! built so far.

use crate::address;
use crate::connection::ServerConnection;
use crate::error::{PipeError, Result};
use crate::registry::PipeRegistry;
use crate::server::PipeServer;
use crate::transport::PipeTransport;

/// Pair a connector with the listener registered under `name`.
///
/// On success the listener's acceptor has already run and the returned
/// transport is the client half of the new channel. See
/// [`PipeRegistry::connect`] for the caller-facing contract.
pub(crate) fn establish(registry: &PipeRegistry, name: &str) -> Result<PipeTransport> {
    // A registry that was never allocated, an unknown name, and a
    // disconnected listener are indistinguishable to the connector: no
    // server.
    let inner = {
        let state = registry.state().borrow();
        if !state.is_allocated() {
            return Err(PipeError::NoServer(name.to_string()));
        }
        state
            .lookup(name)
            .ok_or_else(|| PipeError::NoServer(name.to_string()))?
    };
    if inner.is_disconnected() {
        return Err(PipeError::NoServer(name.to_string()));
    }
    // Strong handle, held until after the acceptor hand-off: keeps the
    // listener alive even if the acceptor releases every other handle.
    let server = PipeServer::from_inner(inner);

    let address = address::format_address(name);

    let (mut client_half, mut server_half) =
        registry.factory().full_duplex_pair(false).map_err(|e| {
            tracing::debug!("failed to create full duplex pipe for '{}': {}", name, e);
            PipeError::ConnectionFailed(format!("could not create full-duplex pipe: {e}"))
        })?;

    client_half.set_close_on_exec();
    server_half.set_close_on_exec();

    let client_transport = PipeTransport::new_for_channel(client_half, false, Some(address));

    let mut server_transport = PipeTransport::new_for_channel(server_half, true, None);
    server_transport.set_auth_mechanisms(server.auth_mechanisms());

    let connection = ServerConnection::new_for_transport(server_transport);

    tracing::debug!("paired connector with listener '{}'", name);

    // The connection moves into the acceptor. If nobody keeps a handle to
    // it, it is torn down before `deliver` returns and the client
    // transport observes an immediate disconnect — the designed outcome
    // for "nobody wants this connection".
    server.deliver(connection);

    Ok(client_transport)
}
