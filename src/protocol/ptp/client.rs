//! PTP client synchronization state machine.
//!
//! A single [`PtpClient`] owns all protocol state and is driven by exactly
//! one serial consumer: inbound datagrams and timer expirations are fed
//! in arrival order through [`PtpClient::handle_datagram`] and
//! [`PtpClient::handle_timer`]. Nothing here blocks or locks; the only
//! state visible to other contexts is published through [`PtpStatus`]
//! atomics.
//!
//! ```text
//!            Sync (two-step)            Follow_Up (seq match)
//!   Idle ───────────────────▶ WaitFollowUp ──────────────▶ Idle
//!    │  ▲
//!    │  │ Delay_Resp (seq + requester match), send failure, no TX timestamp
//!    │  │
//!    └──┴──▶ WaitDelayResp   (timer expiry with TX timestamp captured)
//! ```

use std::sync::Arc;

use serde::Serialize;

use super::clock::{ClockCorrection, Correction, RttUpdate};
use super::config::PtpClientConfig;
use super::message::{
    AnnounceMessage, ClockIdentity, DelayRespMessage, PtpHeader, PtpMessage, PtpParseError,
    parse_timestamp,
};
use super::scheduler::RetryScheduler;
use super::selection::{SelectionOutcome, ServerSelection};
use super::status::{PtpStatus, StatusHandle};
use crate::net::{Endpoint, HardwareClock, RandomSource, Timer, Transport};

/// Phase of the synchronization exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u8)]
pub enum SyncPhase {
    /// No exchange in progress.
    #[default]
    Idle = 0,
    /// Got a two-step Sync, waiting for its `Follow_Up`.
    WaitFollowUp = 1,
    /// Sent a `Delay_Req`, waiting for its `Delay_Resp`.
    WaitDelayResp = 2,
}

impl SyncPhase {
    /// Decode the value stored by `self as u8`; unknown values map to `Idle`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::WaitFollowUp,
            2 => Self::WaitDelayResp,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::WaitFollowUp => write!(f, "waiting for Follow_Up"),
            Self::WaitDelayResp => write!(f, "waiting for Delay_Resp"),
        }
    }
}

/// Why a well-formed message left the state untouched.
///
/// All of these are expected under packet loss, reordering, or with
/// several clients and servers on one multicast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The transport delivered no receive timestamp.
    NoRxTimestamp,
    /// Message from a server other than the selected one.
    NotSelectedServer,
    /// Message does not fit the current phase.
    UnexpectedPhase,
    /// Sequence id does not match the outstanding request.
    SequenceMismatch,
    /// `Delay_Resp` addressed to another client.
    OtherClient,
    /// Message type the client does not act on.
    UnhandledMessage,
}

/// Disposition of one inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The message changed client state.
    Applied,
    /// The message was valid but irrelevant right now.
    Ignored(IgnoreReason),
    /// The message was malformed and dropped.
    Dropped(PtpParseError),
}

/// Input to the protocol task, delivered strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtpEvent {
    /// A datagram arrived on one of the endpoints.
    Datagram {
        /// Receiving endpoint
        endpoint: Endpoint,
        /// Datagram payload
        data: Vec<u8>,
        /// Local receive timestamp in nanoseconds, if captured
        rx_timestamp: Option<u64>,
    },
    /// The retry timer expired.
    TimerExpired,
}

/// Mutable protocol state, owned by the protocol task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientState {
    pub(super) phase: SyncPhase,
    pub(super) sync_sequence_id: u16,
    pub(super) delay_req_sequence_id: u16,
    /// Sync arrival time (`WaitFollowUp`) or `Delay_Req` send time (`WaitDelayResp`).
    pub(super) time_last: u64,
    pub(super) utc_offset_s: u16,
    pub(super) correction: ClockCorrection,
    pub(super) selection: ServerSelection,
}

impl ClientState {
    fn new(speed_adjustment: bool) -> Self {
        Self {
            correction: ClockCorrection::new(speed_adjustment),
            ..Self::default()
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Sequence id of the last Sync from the selected server.
    #[must_use]
    pub fn sync_sequence_id(&self) -> u16 {
        self.sync_sequence_id
    }

    /// Sequence id of the outstanding `Delay_Req`.
    #[must_use]
    pub fn delay_req_sequence_id(&self) -> u16 {
        self.delay_req_sequence_id
    }

    /// Reference timestamp of the exchange in progress.
    #[must_use]
    pub fn time_last(&self) -> u64 {
        self.time_last
    }

    /// TAI - UTC offset from the selected server, in seconds.
    #[must_use]
    pub fn utc_offset_s(&self) -> u16 {
        self.utc_offset_s
    }

    /// Offset, drift and RTT estimation state.
    #[must_use]
    pub fn correction(&self) -> &ClockCorrection {
        &self.correction
    }

    /// Server selection state.
    #[must_use]
    pub fn selection(&self) -> &ServerSelection {
        &self.selection
    }
}

/// PTP client protocol engine.
///
/// Generic over its collaborators so that the tokio driver and the
/// tests run the very same state machine.
pub struct PtpClient<T, C, M, R> {
    pub(super) local_identity: ClockIdentity,
    pub(super) state: ClientState,
    pub(super) transport: T,
    pub(super) clock: C,
    pub(super) scheduler: RetryScheduler<M, R>,
    pub(super) status: Arc<PtpStatus>,
}

impl<T, C, M, R> PtpClient<T, C, M, R>
where
    T: Transport,
    C: HardwareClock,
    M: Timer,
    R: RandomSource,
{
    /// Create a client in phase `Idle` with no server selected.
    ///
    /// No timer is armed: delay measurement starts once an Announce
    /// selects a server.
    pub fn new(
        local_identity: ClockIdentity,
        transport: T,
        clock: C,
        timer: M,
        random: R,
        config: &PtpClientConfig,
    ) -> Self {
        let client = Self {
            local_identity,
            state: ClientState::new(config.speed_adjustment),
            transport,
            clock,
            scheduler: RetryScheduler::new(
                timer,
                random,
                config.delay_req_interval,
                config.delay_req_timeout,
            ),
            status: Arc::new(PtpStatus::new(local_identity)),
        };
        client.publish();
        client
    }

    /// Handle one queued event.
    ///
    /// Returns the datagram outcome, or `None` for a timer expiry.
    pub fn handle_event(&mut self, event: &PtpEvent) -> Option<HandleOutcome> {
        match event {
            PtpEvent::Datagram {
                endpoint,
                data,
                rx_timestamp,
            } => Some(self.handle_datagram(*endpoint, data, *rx_timestamp)),
            PtpEvent::TimerExpired => {
                self.handle_timer();
                None
            }
        }
    }

    /// Handle one inbound datagram.
    pub fn handle_datagram(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        rx_timestamp: Option<u64>,
    ) -> HandleOutcome {
        let Some(arrival_ns) = rx_timestamp else {
            // Without a receive timestamp no synchronization is possible.
            tracing::error!(%endpoint, "PTP client: no RX timestamp");
            return HandleOutcome::Ignored(IgnoreReason::NoRxTimestamp);
        };
        let message = match PtpMessage::decode(data) {
            Ok(message) => message,
            Err(PtpParseError::UnknownMessageType(code)) => {
                tracing::debug!(
                    %endpoint,
                    "PTP client: ignoring unhandled message type 0x{code:X}"
                );
                return HandleOutcome::Ignored(IgnoreReason::UnhandledMessage);
            }
            Err(e) => {
                tracing::debug!(%endpoint, len = data.len(), "PTP client: dropping message: {e}");
                return HandleOutcome::Dropped(e);
            }
        };
        self.handle_message(&message, arrival_ns)
    }

    /// Handle a decoded message that arrived at local time `arrival_ns`.
    pub fn handle_message(&mut self, message: &PtpMessage, arrival_ns: u64) -> HandleOutcome {
        let outcome = match message {
            PtpMessage::Sync(header) => self.handle_sync(header, arrival_ns),
            PtpMessage::FollowUp(header) => self.handle_follow_up(header),
            PtpMessage::DelayResp(resp) => self.handle_delay_resp(resp),
            PtpMessage::Announce(announce) => self.handle_announce(announce),
            PtpMessage::DelayReq(_) => HandleOutcome::Ignored(IgnoreReason::UnhandledMessage),
        };
        if outcome == HandleOutcome::Applied {
            self.publish();
        }
        outcome
    }

    fn handle_sync(&mut self, header: &PtpHeader, arrival_ns: u64) -> HandleOutcome {
        if !self.state.selection.is_selected(&header.clock_identity) {
            return HandleOutcome::Ignored(IgnoreReason::NotSelectedServer);
        }
        self.state.sync_sequence_id = header.sequence_id;
        tracing::debug!(
            seq = header.sequence_id,
            flags = format_args!("0x{:04x}", header.flags),
            "PTP client: got Sync"
        );
        if !header.is_two_step() {
            // One-step: the Sync already carries the precise send time.
            self.apply_correction(parse_timestamp(header), arrival_ns);
            self.state.phase = SyncPhase::Idle;
            return HandleOutcome::Applied;
        }
        self.state.time_last = arrival_ns;
        self.state.phase = SyncPhase::WaitFollowUp;
        HandleOutcome::Applied
    }

    fn handle_follow_up(&mut self, header: &PtpHeader) -> HandleOutcome {
        if !self.state.selection.is_selected(&header.clock_identity) {
            return HandleOutcome::Ignored(IgnoreReason::NotSelectedServer);
        }
        if self.state.phase != SyncPhase::WaitFollowUp {
            tracing::debug!(seq = header.sequence_id, "PTP client: ignoring unexpected Follow_Up");
            return HandleOutcome::Ignored(IgnoreReason::UnexpectedPhase);
        }
        if header.sequence_id != self.state.sync_sequence_id {
            tracing::debug!(
                seq = header.sequence_id,
                expected = self.state.sync_sequence_id,
                "PTP client: ignoring Follow_Up with unexpected sequence id"
            );
            return HandleOutcome::Ignored(IgnoreReason::SequenceMismatch);
        }
        tracing::debug!(seq = header.sequence_id, "PTP client: got Follow_Up");
        self.apply_correction(parse_timestamp(header), self.state.time_last);
        self.state.phase = SyncPhase::Idle;
        HandleOutcome::Applied
    }

    fn handle_delay_resp(&mut self, resp: &DelayRespMessage) -> HandleOutcome {
        let header = &resp.header;
        if !self.state.selection.is_selected(&header.clock_identity) {
            return HandleOutcome::Ignored(IgnoreReason::NotSelectedServer);
        }
        if self.state.phase != SyncPhase::WaitDelayResp {
            tracing::debug!(seq = header.sequence_id, "PTP client: ignoring unexpected Delay_Resp");
            return HandleOutcome::Ignored(IgnoreReason::UnexpectedPhase);
        }
        if resp.requesting_identity != self.local_identity {
            tracing::debug!(
                requester = %resp.requesting_identity,
                "PTP client: ignoring Delay_Resp intended for other client"
            );
            return HandleOutcome::Ignored(IgnoreReason::OtherClient);
        }
        if header.sequence_id != self.state.delay_req_sequence_id {
            tracing::debug!(
                seq = header.sequence_id,
                expected = self.state.delay_req_sequence_id,
                "PTP client: ignoring Delay_Resp with unexpected sequence id"
            );
            return HandleOutcome::Ignored(IgnoreReason::SequenceMismatch);
        }
        let update = self
            .state
            .correction
            .adjust_rtt(self.state.time_last, parse_timestamp(header));
        if let RttUpdate::Initial(rtt) | RttUpdate::Smoothed(rtt) = update {
            tracing::debug!(rtt_ns = rtt, "PTP client: updated network delay estimate");
        }
        self.status.record_delay_exchange();
        self.state.phase = SyncPhase::Idle;
        self.scheduler.arm_interval();
        HandleOutcome::Applied
    }

    fn handle_announce(&mut self, announce: &AnnounceMessage) -> HandleOutcome {
        match self.state.selection.evaluate(announce) {
            SelectionOutcome::Refreshed { .. } => HandleOutcome::Applied,
            SelectionOutcome::Rejected => HandleOutcome::Ignored(IgnoreReason::NotSelectedServer),
            SelectionOutcome::Switched { previous } => {
                tracing::info!(
                    server = %announce.header.clock_identity,
                    previous = %previous.map_or_else(|| "none".to_owned(), |id| id.to_string()),
                    priority1 = announce.priority1,
                    "PTP client: switching to new PTP server"
                );
                self.state.phase = SyncPhase::Idle;
                // The path to the new server likely has a different delay.
                self.state.correction.reset_rtt();
                self.state.utc_offset_s = announce.utc_offset;
                self.status.record_server_switch();
                // Measure the new path's delay.
                self.scheduler.arm_interval();
                HandleOutcome::Applied
            }
        }
    }

    /// Handle expiry of the retry timer.
    pub fn handle_timer(&mut self) {
        match self.state.phase {
            SyncPhase::WaitDelayResp => {
                tracing::debug!("PTP client: Delay_Resp timed out, sending new request");
            }
            SyncPhase::WaitFollowUp => {
                tracing::debug!("PTP client: waiting for Follow_Up before sending Delay_Req");
                self.scheduler.arm_timeout();
            }
            SyncPhase::Idle => {}
        }

        self.send_delay_req();

        // Restored by the next Announce of the selected server; a silent
        // server is eventually replaced by a backup.
        self.state.selection.age();
        self.publish();
    }

    fn apply_correction(&mut self, server_time_ns: u64, local_time_ns: u64) -> Correction {
        let correction = self
            .state
            .correction
            .adjust(&mut self.clock, server_time_ns, local_time_ns);
        self.status.record_correction();
        correction
    }

    pub(super) fn publish(&self) {
        self.status.store(&self.state);
    }

    /// Local clock identity.
    #[must_use]
    pub fn local_identity(&self) -> ClockIdentity {
        self.local_identity
    }

    /// Protocol state.
    #[must_use]
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.state.phase
    }

    /// RTT estimate in nanoseconds.
    #[must_use]
    pub fn rtt_ns(&self) -> u32 {
        self.state.correction.rtt_ns()
    }

    /// Drift estimate (2^32 scale).
    #[must_use]
    pub fn drift(&self) -> i32 {
        self.state.correction.drift()
    }

    /// UTC offset in seconds.
    #[must_use]
    pub fn utc_offset(&self) -> u16 {
        self.state.utc_offset_s
    }

    /// Selected server, if any.
    #[must_use]
    pub fn server_identity(&self) -> Option<ClockIdentity> {
        self.state.selection.server()
    }

    /// Stored (aged) priority of the selected server.
    #[must_use]
    pub fn server_priority(&self) -> u8 {
        self.state.selection.priority()
    }

    /// Read-only status view for other contexts.
    #[must_use]
    pub fn status(&self) -> StatusHandle {
        StatusHandle::new(Arc::clone(&self.status))
    }

    /// Transport collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transport collaborator, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Clock collaborator.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Timer collaborator.
    pub fn timer(&self) -> &M {
        self.scheduler.timer()
    }

    /// Timer collaborator, mutably.
    pub fn timer_mut(&mut self) -> &mut M {
        self.scheduler.timer_mut()
    }
}

impl<T, C, M, R> std::fmt::Debug for PtpClient<T, C, M, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtpClient")
            .field("local_identity", &format_args!("{}", self.local_identity))
            .field("server", &self.state.selection.server())
            .field("phase", &self.state.phase)
            .field("rtt_ns", &self.state.correction.rtt_ns())
            .field("drift", &self.state.correction.drift())
            .finish_non_exhaustive()
    }
}
