use std::io;
use std::net::Ipv6Addr;
use thiserror::Error;

/// Errors that can occur while starting the PTP client
///
/// Once running, the client never fails: malformed or unexpected messages
/// are dropped and transport problems are retried.
#[derive(Debug, Error)]
pub enum PtpClientError {
    // ===== Interface Errors =====
    /// No usable network interface was found
    #[error("no usable network interface (requested: {requested:?})")]
    NoInterface {
        /// Interface name that was asked for, if any
        requested: Option<String>,
    },

    /// Listing the network interfaces failed
    #[error("interface query failed: {message}")]
    InterfaceQuery {
        /// Description of the failure
        message: String,
    },

    // ===== Socket Errors =====
    /// Binding a PTP socket failed
    #[error("failed to bind PTP socket on port {port}: {source}")]
    Transport {
        /// Port that could not be bound
        port: u16,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Joining the PTP multicast group failed
    #[error("failed to join multicast group {group}: {source}")]
    MulticastJoin {
        /// Multicast group
        group: Ipv6Addr,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Selecting the outgoing multicast interface failed
    #[error("failed to send multicast on interface {index}: {source}")]
    MulticastInterface {
        /// Interface index
        index: u32,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
