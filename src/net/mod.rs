//! Host collaborators
//!
//! The protocol core only sees the traits in this module. The tokio
//! implementations wire it to real UDP sockets, a software clock and a
//! deadline timer.

mod interface;
mod traits;

#[cfg(feature = "tokio-runtime")]
mod tokio_impl;

#[cfg(test)]
mod tests;

pub use interface::{InterfaceInfo, discover_interface};
pub use traits::{Endpoint, HardwareClock, IdentitySource, RandomSource, Timer, Transport};

// Re-export the active runtime's types
#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::*;
