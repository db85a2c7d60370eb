//! Error types for loopwire.

use thiserror::Error;

/// Main error type for all loopwire operations.
#[derive(Debug, Error)]
pub enum PipeError {
    /// A listener is already registered under this name.
    #[error("address in use: debug-pipe:name={0}")]
    AddressInUse(String),

    /// No listener is registered under this name, or the listener has
    /// been disconnected.
    #[error("no server available for debug-pipe:name={0}")]
    NoServer(String),

    /// An address string does not use the `debug-pipe:name=` scheme.
    #[error("bad address: {0}")]
    BadAddress(String),

    /// A collaborator (typically a custom [`ChannelPairFactory`]) ran out
    /// of resources.
    ///
    /// Plain allocation failure aborts the process in Rust, so the core
    /// itself never produces this variant; it is part of the public error
    /// domain for factories backed by finite resources.
    ///
    /// [`ChannelPairFactory`]: crate::transport::ChannelPairFactory
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The channel-pair primitive failed. The underlying cause is
    /// preserved in the message.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Result type alias using PipeError.
pub type Result<T> = std::result::Result<T, PipeError>;
