//! # loopwire
//!
//! In-process named debug-pipe harness: exercise a message-passing stack
//! end-to-end (handshake, framing, dispatch) inside a single process,
//! deterministically, with no network or filesystem transport.
//!
//! ## Architecture
//!
//! - **Registry** ([`PipeRegistry`]): maps symbolic names to listeners;
//!   its storage exists exactly while at least one listener is alive.
//! - **Listener** ([`PipeServer`]): a named endpoint with an acceptor
//!   callback, created via [`PipeRegistry::listen`].
//! - **Establishment** ([`PipeRegistry::connect`]): manufactures an
//!   in-memory full-duplex channel pair, wraps the halves as client and
//!   server transports, and synchronously delivers the server-side
//!   connection to the acceptor before returning the client transport.
//!
//! The core is single-threaded by construction: registry and listener
//! handles are `!Send`, so the no-locking design is enforced by the
//! compiler. Transport I/O itself is async (`AsyncRead`/`AsyncWrite`).
//!
//! ## Example
//!
//! ```ignore
//! use loopwire::PipeRegistry;
//!
//! let registry = PipeRegistry::new();
//!
//! let server = registry.listen("echo")?;
//! server.set_acceptor(|_server, conn| {
//!     // Hold on to `conn` to keep talking to the client; dropping it
//!     // here makes the client read an immediate disconnect.
//! });
//!
//! let client = registry.connect("echo")?;
//! assert_eq!(client.address(), Some("debug-pipe:name=echo"));
//! ```

pub mod address;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server;
pub mod transport;

mod establish;

pub use connection::ServerConnection;
pub use error::{PipeError, Result};
pub use registry::PipeRegistry;
pub use server::{AcceptorFn, PipeServer};
pub use transport::{ChannelHandle, ChannelPairFactory, InMemoryPairFactory, PipeTransport};
