//! # ptp-client
//!
//! A Precision Time Protocol (IEEE 1588) client that keeps the local clock
//! synchronized to a time server on the network.
//!
//! ## Features
//!
//! - Sync / `Follow_Up` offset correction (one-step and two-step servers)
//! - `Delay_Req` / `Delay_Resp` round-trip delay estimation
//! - Drift estimation feeding a clock speed adjustment
//! - Server selection by Announce priority, with failover to backups
//!
//! ## Example
//!
//! ```rust,no_run
//! use ptp_client::{PtpClientConfig, PtpClientHandle};
//!
//! # async fn example() -> Result<(), ptp_client::PtpClientError> {
//! let client = PtpClientHandle::start(PtpClientConfig::default()).await?;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//! println!("{}", client.status().snapshot());
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Protocol core**: [`PtpClient`], a runtime-agnostic state machine
//!   driven one event at a time
//! - **Collaborators**: [`net`] traits for the transport, clock, timer and
//!   randomness, with tokio implementations
//! - **Driver**: [`PtpClientHandle`], which owns the sockets and tasks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
pub mod net;
pub mod protocol;

/// Testing utilities
pub mod testing;

#[cfg(test)]
mod error_tests;

// Re-exports
pub use error::PtpClientError;
pub use protocol::ptp::{
    ClockIdentity, HandleOutcome, PtpClient, PtpClientConfig, PtpTimestamp, StatusHandle,
    StatusSnapshot, SyncPhase,
};
#[cfg(feature = "tokio-runtime")]
pub use protocol::ptp::PtpClientHandle;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
