//! Read-only status published by the protocol task.
//!
//! The protocol task is the only writer. Readers (a status command, a
//! monitoring endpoint) may observe fields from different updates, which
//! is acceptable for display purposes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::client::{ClientState, SyncPhase};
use super::message::ClockIdentity;

/// Atomic status fields shared between the protocol task and readers.
#[derive(Debug)]
pub struct PtpStatus {
    local_identity: AtomicU64,
    server_identity: AtomicU64,
    server_selected: AtomicBool,
    server_priority: AtomicU8,
    utc_offset_s: AtomicU16,
    rtt_ns: AtomicU32,
    drift: AtomicI32,
    phase: AtomicU8,
    corrections: AtomicU64,
    delay_exchanges: AtomicU64,
    server_switches: AtomicU64,
    send_failures: AtomicU64,
}

impl PtpStatus {
    pub(crate) fn new(local_identity: ClockIdentity) -> Self {
        Self {
            local_identity: AtomicU64::new(local_identity.to_u64()),
            server_identity: AtomicU64::new(0),
            server_selected: AtomicBool::new(false),
            server_priority: AtomicU8::new(u8::MAX),
            utc_offset_s: AtomicU16::new(0),
            rtt_ns: AtomicU32::new(0),
            drift: AtomicI32::new(0),
            phase: AtomicU8::new(SyncPhase::Idle as u8),
            corrections: AtomicU64::new(0),
            delay_exchanges: AtomicU64::new(0),
            server_switches: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn store(&self, state: &ClientState) {
        let selection = state.selection();
        let server = selection.server();
        self.server_identity
            .store(server.map_or(0, ClockIdentity::to_u64), Ordering::Release);
        self.server_selected
            .store(server.is_some(), Ordering::Release);
        self.server_priority
            .store(selection.priority(), Ordering::Release);
        self.utc_offset_s
            .store(state.utc_offset_s(), Ordering::Release);
        self.rtt_ns
            .store(state.correction().rtt_ns(), Ordering::Release);
        self.drift.store(state.correction().drift(), Ordering::Release);
        self.phase.store(state.phase() as u8, Ordering::Release);
    }

    pub(crate) fn record_correction(&self) {
        self.corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delay_exchange(&self) {
        self.delay_exchanges.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_server_switch(&self) {
        self.server_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable read-only view of a running client's status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<PtpStatus>,
}

impl StatusHandle {
    pub(crate) fn new(inner: Arc<PtpStatus>) -> Self {
        Self { inner }
    }

    /// Local clock identity.
    #[must_use]
    pub fn local_identity(&self) -> ClockIdentity {
        ClockIdentity::from_u64(self.inner.local_identity.load(Ordering::Acquire))
    }

    /// Selected server, if any.
    #[must_use]
    pub fn server_identity(&self) -> Option<ClockIdentity> {
        self.inner
            .server_selected
            .load(Ordering::Acquire)
            .then(|| ClockIdentity::from_u64(self.inner.server_identity.load(Ordering::Acquire)))
    }

    /// Stored priority of the selected server.
    #[must_use]
    pub fn server_priority(&self) -> u8 {
        self.inner.server_priority.load(Ordering::Acquire)
    }

    /// TAI - UTC offset in seconds.
    #[must_use]
    pub fn utc_offset(&self) -> u16 {
        self.inner.utc_offset_s.load(Ordering::Acquire)
    }

    /// Round-trip delay estimate in nanoseconds.
    #[must_use]
    pub fn rtt_ns(&self) -> u32 {
        self.inner.rtt_ns.load(Ordering::Acquire)
    }

    /// Drift estimate (2^32 scale).
    #[must_use]
    pub fn drift(&self) -> i32 {
        self.inner.drift.load(Ordering::Acquire)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    /// Number of offset corrections applied.
    #[must_use]
    pub fn corrections(&self) -> u64 {
        self.inner.corrections.load(Ordering::Relaxed)
    }

    /// Number of completed `Delay_Req`/`Delay_Resp` exchanges.
    #[must_use]
    pub fn delay_exchanges(&self) -> u64 {
        self.inner.delay_exchanges.load(Ordering::Relaxed)
    }

    /// Number of server switches.
    #[must_use]
    pub fn server_switches(&self) -> u64 {
        self.inner.server_switches.load(Ordering::Relaxed)
    }

    /// Number of `Delay_Req` messages that failed to send or had no TX timestamp.
    #[must_use]
    pub fn send_failures(&self) -> u64 {
        self.inner.send_failures.load(Ordering::Relaxed)
    }

    /// Copy all fields.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            local_identity: self.local_identity(),
            server_identity: self.server_identity(),
            server_priority: self.server_priority(),
            utc_offset_s: self.utc_offset(),
            rtt_ns: self.rtt_ns(),
            drift: self.drift(),
            phase: self.phase(),
            corrections: self.corrections(),
            delay_exchanges: self.delay_exchanges(),
            server_switches: self.server_switches(),
            send_failures: self.send_failures(),
        }
    }
}

/// Point-in-time copy of the client status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Local clock identity
    #[serde(serialize_with = "serialize_display")]
    pub local_identity: ClockIdentity,
    /// Selected server, if any
    #[serde(serialize_with = "serialize_optional_display")]
    pub server_identity: Option<ClockIdentity>,
    /// Stored priority of the selected server
    pub server_priority: u8,
    /// TAI - UTC offset in seconds
    pub utc_offset_s: u16,
    /// Round-trip delay estimate in nanoseconds
    pub rtt_ns: u32,
    /// Drift estimate (2^32 scale)
    pub drift: i32,
    /// Current phase
    pub phase: SyncPhase,
    /// Offset corrections applied
    pub corrections: u64,
    /// Completed delay exchanges
    pub delay_exchanges: u64,
    /// Server switches
    pub server_switches: u64,
    /// Failed `Delay_Req` sends
    pub send_failures: u64,
}

fn serialize_display<S: Serializer>(
    value: &ClockIdentity,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn serialize_optional_display<S: Serializer>(
    value: &Option<ClockIdentity>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(id) => serializer.collect_str(id),
        None => serializer.serialize_none(),
    }
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Local Clock ID:           {}", self.local_identity)?;
        writeln!(
            f,
            "Selected Server Clock ID: {}",
            self.server_identity.unwrap_or(ClockIdentity::ZERO)
        )?;
        writeln!(f, "Current offset to UTC time: {} secs", self.utc_offset_s)?;
        writeln!(
            f,
            "Estimated network delay (whole round trip): {} ns",
            self.rtt_ns
        )?;
        write!(
            f,
            "Estimated clock drift: {}%",
            format_drift_percent(self.drift)
        )
    }
}

/// Render a 2^32-scaled drift as a percentage with seven decimals.
///
/// `drift * 10^9 >> 32` is the drift in units of 10^-9, i.e. 10^-7 percent.
#[must_use]
pub fn format_drift_percent(drift: i32) -> String {
    let scaled = (i64::from(drift) * 1_000_000_000) >> 32;
    let sign = if scaled < 0 { "-" } else { "" };
    let magnitude = scaled.unsigned_abs();
    format!(
        "{sign}{}.{:07}",
        magnitude / 10_000_000,
        magnitude % 10_000_000
    )
}

/// Render a clock reading (nanoseconds since epoch) as
/// `Y-M-D HH:MM:SS.nnnnnnnnn` in UTC, without zero padding of the date.
///
/// Readings past the year 2262 are shown as the last representable instant.
#[must_use]
pub fn format_clock_time(nanos: u64) -> String {
    let nanos = i64::try_from(nanos).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_nanos(nanos)
        .format("%Y-%-m-%-d %H:%M:%S%.9f")
        .to_string()
}
