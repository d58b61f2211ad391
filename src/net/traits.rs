//! Collaborator traits for the PTP client core
//!
//! The protocol core never performs I/O itself. It talks to the outside
//! world through these traits, so the same state machine runs against
//! the tokio host implementations or against test doubles.

use std::io;
use std::time::Duration;

use crate::protocol::ptp::message::ClockIdentity;

/// One of the two PTP transport endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Event messages (Sync, `Delay_Req`), UDP port 319
    Event,
    /// General messages (`Follow_Up`, `Delay_Resp`, Announce), UDP port 320
    General,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event => write!(f, "event"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Datagram transport with optional transmit timestamp capture
pub trait Transport {
    /// Send `data` to the time server(s) over `endpoint`
    ///
    /// Returns the captured transmit timestamp in nanoseconds since epoch,
    /// or `None` if the transport could not capture one. Must not block.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the datagram was not sent.
    fn send(&mut self, endpoint: Endpoint, data: &[u8]) -> io::Result<Option<u64>>;
}

/// Hardware clock being disciplined
pub trait HardwareClock {
    /// Current time in nanoseconds since epoch
    fn read(&self) -> u64;

    /// Step the clock by `offset_ns` (positive moves it forward)
    fn step(&mut self, offset_ns: i64);

    /// Set the speed correction
    ///
    /// `drift` is a fixed-point ratio scaled by 2^32: the clock should run
    /// `1 + drift / 2^32` times its nominal rate.
    fn adjust_speed(&mut self, drift: i32);
}

/// Single logical one-shot timer
pub trait Timer {
    /// Arm the timer to expire after `after`, replacing any pending expiry
    fn arm(&mut self, after: Duration);

    /// Cancel the pending expiry, if any
    fn cancel(&mut self);
}

/// Pseudo-random number source
pub trait RandomSource {
    /// Next random `u32`
    fn random_u32(&mut self) -> u32;
}

/// Source of a locally unique clock identity
pub trait IdentitySource {
    /// Derive the identity of this clock
    fn derive_unique_id(&self) -> ClockIdentity;
}
