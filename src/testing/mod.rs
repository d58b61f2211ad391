//! Test doubles for the PTP client collaborators
//!
//! Deterministic stand-ins for the transport, clock, timer and random
//! source, plus a [`MockPtpServer`] that builds server messages.

use std::io;
use std::time::Duration;

use crate::net::{Endpoint, HardwareClock, RandomSource, Timer, Transport};
use crate::protocol::ptp::client::PtpClient;
use crate::protocol::ptp::config::PtpClientConfig;
use crate::protocol::ptp::message::{
    AnnounceMessage, ClockIdentity, DelayRespMessage, FLAG_TWO_STEP, FLAG_UTC_OFFSET_VALID,
    PtpHeader, PtpMessageType, TimeSource,
};
use crate::protocol::ptp::timestamp::PtpTimestamp;


/// PTP client running entirely on test doubles.
pub type MockPtpClient = PtpClient<MockTransport, MockClock, MockTimer, FixedRandom>;

/// How [`MockTransport`] answers a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBehavior {
    /// Succeed and report this transmit timestamp
    Timestamp(u64),
    /// Succeed without a transmit timestamp
    NoTimestamp,
    /// Fail with an I/O error
    Fail,
}

/// Transport that records every datagram
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Answer to the next sends
    pub behavior: SendBehavior,
    /// Every datagram passed to `send`, including failed ones
    pub sent: Vec<(Endpoint, Vec<u8>)>,
}

impl MockTransport {
    /// Transport reporting `tx_timestamp` for every send
    #[must_use]
    pub fn new(tx_timestamp: u64) -> Self {
        Self {
            behavior: SendBehavior::Timestamp(tx_timestamp),
            sent: Vec::new(),
        }
    }

    /// Last datagram sent
    #[must_use]
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(|(_, data)| data.as_slice())
    }
}

impl Transport for MockTransport {
    fn send(&mut self, endpoint: Endpoint, data: &[u8]) -> io::Result<Option<u64>> {
        self.sent.push((endpoint, data.to_vec()));
        match self.behavior {
            SendBehavior::Timestamp(ts) => Ok(Some(ts)),
            SendBehavior::NoTimestamp => Ok(None),
            SendBehavior::Fail => Err(io::Error::other("mock send failure")),
        }
    }
}

/// Clock that records steps and speed adjustments
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    /// Current reading in nanoseconds
    pub now: u64,
    /// Every step, in order
    pub steps: Vec<i64>,
    /// Every speed adjustment, in order
    pub speeds: Vec<i32>,
}

impl MockClock {
    /// Clock reading `now`
    #[must_use]
    pub fn at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

impl HardwareClock for MockClock {
    fn read(&self) -> u64 {
        self.now
    }

    fn step(&mut self, offset_ns: i64) {
        self.now = self.now.saturating_add_signed(offset_ns);
        self.steps.push(offset_ns);
    }

    fn adjust_speed(&mut self, drift: i32) {
        self.speeds.push(drift);
    }
}

/// Timer that records arm and cancel calls
#[derive(Debug, Clone, Default)]
pub struct MockTimer {
    /// Pending expiry, if armed
    pub pending: Option<Duration>,
    /// Every armed duration, in order
    pub armed: Vec<Duration>,
    /// Number of cancel calls
    pub cancels: usize,
}

impl Timer for MockTimer {
    fn arm(&mut self, after: Duration) {
        self.pending = Some(after);
        self.armed.push(after);
    }

    fn cancel(&mut self) {
        self.pending = None;
        self.cancels += 1;
    }
}

/// Random source returning the same value every time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedRandom(pub u32);

impl RandomSource for FixedRandom {
    fn random_u32(&mut self) -> u32 {
        self.0
    }
}

/// Build a client on test doubles
///
/// Jitter is zero, the clock reads `clock_now` and sends report
/// `tx_timestamp`.
#[must_use]
pub fn mock_client(
    local_identity: ClockIdentity,
    clock_now: u64,
    tx_timestamp: u64,
    config: &PtpClientConfig,
) -> MockPtpClient {
    PtpClient::new(
        local_identity,
        MockTransport::new(tx_timestamp),
        MockClock::at(clock_now),
        MockTimer::default(),
        FixedRandom(0),
        config,
    )
}

/// Builds the messages a time server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPtpServer {
    /// Server clock identity
    pub identity: ClockIdentity,
}

impl MockPtpServer {
    /// Server with the given identity
    #[must_use]
    pub fn new(identity: u64) -> Self {
        Self {
            identity: ClockIdentity::from_u64(identity),
        }
    }

    fn header(&self, message_type: PtpMessageType, sequence_id: u16, ns: u64) -> PtpHeader {
        let mut header = PtpHeader::new(message_type, self.identity, sequence_id);
        header.timestamp = PtpTimestamp::from_nanos(ns);
        header
    }

    /// Announce with `priority1` and the TAI - UTC offset
    #[must_use]
    pub fn announce(&self, sequence_id: u16, priority1: u8, utc_offset: u16) -> Vec<u8> {
        let mut header = self.header(PtpMessageType::Announce, sequence_id, 0);
        header.flags = FLAG_UTC_OFFSET_VALID;
        AnnounceMessage {
            header,
            utc_offset,
            priority1,
            clock_quality: [248, 0xFE, 0xFF, 0xFF],
            priority2: 128,
            grandmaster_identity: self.identity,
            steps_removed: 0,
            time_source: TimeSource::InternalOscillator,
        }
        .encode()
        .to_vec()
    }

    /// One-step Sync carrying the precise origin time
    #[must_use]
    pub fn sync_one_step(&self, sequence_id: u16, origin_ns: u64) -> Vec<u8> {
        self.header(PtpMessageType::Sync, sequence_id, origin_ns)
            .encode()
            .to_vec()
    }

    /// Two-step Sync; the origin time follows in a `Follow_Up`
    #[must_use]
    pub fn sync_two_step(&self, sequence_id: u16) -> Vec<u8> {
        let mut header = self.header(PtpMessageType::Sync, sequence_id, 0);
        header.flags = FLAG_TWO_STEP;
        header.encode().to_vec()
    }

    /// `Follow_Up` with the precise origin time of Sync `sequence_id`
    #[must_use]
    pub fn follow_up(&self, sequence_id: u16, precise_origin_ns: u64) -> Vec<u8> {
        self.header(PtpMessageType::FollowUp, sequence_id, precise_origin_ns)
            .encode()
            .to_vec()
    }

    /// `Delay_Resp` to `requester` for `Delay_Req` `sequence_id`
    #[must_use]
    pub fn delay_resp(
        &self,
        sequence_id: u16,
        receive_ns: u64,
        requester: ClockIdentity,
    ) -> Vec<u8> {
        DelayRespMessage {
            header: self.header(PtpMessageType::DelayResp, sequence_id, receive_ns),
            requesting_identity: requester,
            requesting_port_id: 1,
        }
        .encode()
        .to_vec()
    }
}
