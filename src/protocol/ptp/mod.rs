//! Precision Time Protocol (PTP, IEEE 1588) client.
//!
//! Synchronizes the local clock to a time server on the network. Only the
//! client role is implemented; there is no master/server functionality.
//!
//! ## Standard PTP Ports
//!
//! - **319**: Event messages (Sync, `Delay_Req`), require timestamping.
//! - **320**: General messages (`Follow_Up`, `Delay_Resp`, Announce).
//!
//! ## Clock Synchronization Flow
//!
//! ```text
//! Server                          Client
//!   |--- Announce (priority1) ------>|  (server selection)
//!   |--- Sync (T1) ----------------->|  (client records T2)
//!   |--- Follow_Up (precise T1) ---->|  step clock by T1 - T2 + RTT/2
//!   |                                |
//!   |<---- Delay_Req (T3) ---------- |
//!   |---- Delay_Resp (T4) --------->|  RTT = T4 - (T3 - RTT/2)
//! ```
//!
//! The offset is corrected on every Sync; the round-trip delay is
//! measured at a slow, jittered interval. The drift between consecutive
//! corrections feeds the clock's speed adjustment.

pub mod client;
pub mod clock;
pub mod config;
#[cfg(feature = "tokio-runtime")]
pub mod handler;
pub mod message;
pub mod scheduler;
pub mod selection;
pub mod status;
pub mod timestamp;

#[cfg(test)]
mod tests;

// Re-exports for convenient access.
pub use client::{ClientState, HandleOutcome, IgnoreReason, PtpClient, PtpEvent, SyncPhase};
pub use clock::{ClockCorrection, Correction, DriftEstimator, DriftUpdate, RttEstimator, RttUpdate};
pub use config::{PTP_EVENT_PORT, PTP_GENERAL_PORT, PTP_PRIMARY_MULTICAST, PtpClientConfig};
#[cfg(feature = "tokio-runtime")]
pub use handler::{HostPtpClient, PtpClientHandle};
pub use message::{
    AnnounceMessage, ClockIdentity, DelayRespMessage, PtpHeader, PtpMessage, PtpMessageType,
    PtpParseError, TimeSource,
};
pub use scheduler::RetryScheduler;
pub use selection::{SelectionOutcome, ServerSelection};
pub use status::{PtpStatus, StatusHandle, StatusSnapshot, format_clock_time, format_drift_percent};
pub use timestamp::PtpTimestamp;
