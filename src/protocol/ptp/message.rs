//! PTP message types, parsing, and encoding.
//!
//! Implements the IEEE 1588 v2 common header (44 bytes including the
//! origin timestamp) and the two message bodies the client consumes
//! beyond the header: Announce and `Delay_Resp`. Sub-byte fields are
//! packed with explicit shifts and masks; all integers are big-endian.

use super::timestamp::PtpTimestamp;

/// Two-step flag: a `Follow_Up` carries the precise Sync timestamp.
pub const FLAG_TWO_STEP: u16 = 0x0200;

/// The server operates in unicast mode.
pub const FLAG_UNICAST: u16 = 0x0400;

/// The UTC offset stated in an Announce is valid.
pub const FLAG_UTC_OFFSET_VALID: u16 = 0x0004;

/// Value placed in the obsolete control field of a `Delay_Req`.
pub const DELAY_REQ_CONTROL: u8 = 1;

/// Log message interval placed in a `Delay_Req` (IEEE 1588 table 42).
pub const DELAY_REQ_LOG_INTERVAL: u8 = 0x7F;

/// Port id used for the single port of this client.
pub const LOCAL_PORT_ID: u16 = 1;

/// PTP message type identifiers (IEEE 1588 Section 13.3.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PtpMessageType {
    /// Sync message (server → client).
    Sync = 0x00,
    /// Delay request (client → server).
    DelayReq = 0x01,
    /// Follow-up (server → client), carries the precise Sync send time.
    FollowUp = 0x08,
    /// Delay response (server → client), carries the `Delay_Req` receive time.
    DelayResp = 0x09,
    /// Announce (server → client), clock properties.
    Announce = 0x0B,
}

impl PtpMessageType {
    /// Parse from the lower 4 bits of a byte.
    ///
    /// # Errors
    /// Returns [`PtpParseError::UnknownMessageType`] for codes this client does not handle.
    pub fn from_nibble(value: u8) -> Result<Self, PtpParseError> {
        match value & 0x0F {
            0x00 => Ok(Self::Sync),
            0x01 => Ok(Self::DelayReq),
            0x08 => Ok(Self::FollowUp),
            0x09 => Ok(Self::DelayResp),
            0x0B => Ok(Self::Announce),
            other => Err(PtpParseError::UnknownMessageType(other)),
        }
    }

    /// Whether this message type is an event message (requires timestamping).
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Sync | Self::DelayReq)
    }
}

impl std::fmt::Display for PtpMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::DelayReq => write!(f, "Delay_Req"),
            Self::FollowUp => write!(f, "Follow_Up"),
            Self::DelayResp => write!(f, "Delay_Resp"),
            Self::Announce => write!(f, "Announce"),
        }
    }
}

/// Opaque 8-byte identifier of a PTP clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// All-zero identity (no server selected yet).
    pub const ZERO: Self = Self([0; 8]);

    /// Raw identity bytes.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Pack into a `u64` (big-endian), e.g. for atomic storage.
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Unpack from a `u64` (big-endian).
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    fn read(data: &[u8]) -> Self {
        let mut id = [0u8; 8];
        id.copy_from_slice(&data[..8]);
        Self(id)
    }
}

impl std::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}{:02x}",
            id[0], id[1], id[2], id[3], id[4], id[5], id[6], id[7]
        )
    }
}

impl From<[u8; 8]> for ClockIdentity {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

/// Time source advertised in an Announce message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeSource {
    /// Atomic clock.
    AtomicClock,
    /// Satellite system, e.g. GPS.
    Gnss,
    /// Radio signal, e.g. DCF77.
    Radio,
    /// Serial interface, e.g. IRIG.
    Serial,
    /// Another PTP clock.
    Ptp,
    /// An (S)NTP server.
    Ntp,
    /// Manually set.
    HandSet,
    /// Other source.
    Other,
    /// Free-running internal oscillator.
    InternalOscillator,
    /// Code not listed in IEEE 1588 table 6.
    Unknown(u8),
}

impl From<u8> for TimeSource {
    fn from(code: u8) -> Self {
        match code {
            0x10 => Self::AtomicClock,
            0x20 => Self::Gnss,
            0x30 => Self::Radio,
            0x39 => Self::Serial,
            0x40 => Self::Ptp,
            0x50 => Self::Ntp,
            0x60 => Self::HandSet,
            0x70 => Self::Other,
            0xA0 => Self::InternalOscillator,
            other => Self::Unknown(other),
        }
    }
}

impl From<TimeSource> for u8 {
    fn from(source: TimeSource) -> Self {
        match source {
            TimeSource::AtomicClock => 0x10,
            TimeSource::Gnss => 0x20,
            TimeSource::Radio => 0x30,
            TimeSource::Serial => 0x39,
            TimeSource::Ptp => 0x40,
            TimeSource::Ntp => 0x50,
            TimeSource::HandSet => 0x60,
            TimeSource::Other => 0x70,
            TimeSource::InternalOscillator => 0xA0,
            TimeSource::Unknown(code) => code,
        }
    }
}

/// IEEE 1588 v2 common header, including the origin timestamp (44 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpHeader {
    /// Message type (lower 4 bits of byte 0).
    pub message_type: PtpMessageType,
    /// Major SDO id (upper 4 bits of byte 0).
    pub major_sdo_id: u8,
    /// PTP major version (lower 4 bits of byte 1).
    pub version_major: u8,
    /// PTP minor version (upper 4 bits of byte 1).
    pub version_minor: u8,
    /// Total message length including this header.
    pub message_length: u16,
    /// Domain number of the originating clock.
    pub domain_number: u8,
    /// Minor SDO id.
    pub minor_sdo_id: u8,
    /// Flags field.
    pub flags: u16,
    /// Correction field (opaque to this client).
    pub correction: [u8; 8],
    /// Message type specific field.
    pub type_specific: [u8; 4],
    /// Identity of the sending clock.
    pub clock_identity: ClockIdentity,
    /// Port id of the sending clock.
    pub source_port_id: u16,
    /// Sequence id, used to match `Follow_Up`/`Delay_Resp` to their request.
    pub sequence_id: u16,
    /// Obsolete control field.
    pub control: u8,
    /// Log message interval (meaning depends on message type).
    pub log_message_interval: u8,
    /// Origin / precise origin / receive timestamp, depending on type.
    pub timestamp: PtpTimestamp,
}

impl PtpHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 44;

    /// Supported PTP major version.
    pub const VERSION_MAJOR: u8 = 2;

    /// Highest supported PTP minor version (2.0 and 2.1 are accepted).
    pub const MAX_VERSION_MINOR: u8 = 1;

    /// Create a v2.0 header with zeroed optional fields.
    #[must_use]
    pub fn new(message_type: PtpMessageType, clock_identity: ClockIdentity, sequence_id: u16) -> Self {
        Self {
            message_type,
            major_sdo_id: 0,
            version_major: Self::VERSION_MAJOR,
            version_minor: 0,
            message_length: u16::try_from(Self::SIZE).unwrap_or(u16::MAX),
            domain_number: 0,
            minor_sdo_id: 0,
            flags: 0,
            correction: [0; 8],
            type_specific: [0; 4],
            clock_identity,
            source_port_id: LOCAL_PORT_ID,
            sequence_id,
            control: 0,
            log_message_interval: 0,
            timestamp: PtpTimestamp::ZERO,
        }
    }

    /// Whether the two-step flag is set.
    #[must_use]
    pub fn is_two_step(&self) -> bool {
        self.flags & FLAG_TWO_STEP != 0
    }

    /// Encode to 44 bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (self.major_sdo_id << 4) | (self.message_type as u8 & 0x0F);
        buf[1] = (self.version_minor << 4) | (self.version_major & 0x0F);
        buf[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        buf[4] = self.domain_number;
        buf[5] = self.minor_sdo_id;
        buf[6..8].copy_from_slice(&self.flags.to_be_bytes());
        buf[8..16].copy_from_slice(&self.correction);
        buf[16..20].copy_from_slice(&self.type_specific);
        buf[20..28].copy_from_slice(self.clock_identity.bytes());
        buf[28..30].copy_from_slice(&self.source_port_id.to_be_bytes());
        buf[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buf[32] = self.control;
        buf[33] = self.log_message_interval;
        buf[34..44].copy_from_slice(&self.timestamp.encode());
        buf
    }

    /// Decode from bytes.
    ///
    /// The version is checked before the length, so a short datagram of a
    /// foreign protocol version reports [`PtpParseError::UnsupportedVersion`].
    ///
    /// # Errors
    /// Returns `TooShort`, `UnsupportedVersion` or `UnknownMessageType`.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        if data.len() < 2 {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        let version_major = data[1] & 0x0F;
        let version_minor = data[1] >> 4;
        if version_major != Self::VERSION_MAJOR || version_minor > Self::MAX_VERSION_MINOR {
            return Err(PtpParseError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }
        if data.len() < Self::SIZE {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        let message_type = PtpMessageType::from_nibble(data[0])?;
        let timestamp = PtpTimestamp::decode(&data[34..44]).ok_or(PtpParseError::TooShort {
            needed: Self::SIZE,
            have: data.len(),
        })?;
        let mut correction = [0u8; 8];
        correction.copy_from_slice(&data[8..16]);
        let mut type_specific = [0u8; 4];
        type_specific.copy_from_slice(&data[16..20]);
        Ok(Self {
            message_type,
            major_sdo_id: data[0] >> 4,
            version_major,
            version_minor,
            message_length: u16::from_be_bytes([data[2], data[3]]),
            domain_number: data[4],
            minor_sdo_id: data[5],
            flags: u16::from_be_bytes([data[6], data[7]]),
            correction,
            type_specific,
            clock_identity: ClockIdentity::read(&data[20..28]),
            source_port_id: u16::from_be_bytes([data[28], data[29]]),
            sequence_id: u16::from_be_bytes([data[30], data[31]]),
            control: data[32],
            log_message_interval: data[33],
            timestamp,
        })
    }
}

/// Extract the header timestamp as nanoseconds since epoch.
#[must_use]
pub fn parse_timestamp(header: &PtpHeader) -> u64 {
    header.timestamp.to_nanos()
}

/// Encode a `Delay_Req` from `local_id` with the given sequence id.
///
/// Correction, type specific and timestamp fields are zero; the server
/// reports the receive time in its `Delay_Resp`.
#[must_use]
pub fn encode_delay_req(local_id: ClockIdentity, sequence_id: u16) -> [u8; PtpHeader::SIZE] {
    let mut header = PtpHeader::new(PtpMessageType::DelayReq, local_id, sequence_id);
    header.control = DELAY_REQ_CONTROL;
    header.log_message_interval = DELAY_REQ_LOG_INTERVAL;
    header.encode()
}

/// Announce message: header + grandmaster properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceMessage {
    /// Common header.
    pub header: PtpHeader,
    /// Offset between TAI and UTC in seconds.
    pub utc_offset: u16,
    /// Administrator assigned priority (lower = better).
    pub priority1: u8,
    /// Clock quality (class, accuracy, variance), opaque to this client.
    pub clock_quality: [u8; 4],
    /// Secondary administrator assigned priority.
    pub priority2: u8,
    /// Identity of the grandmaster clock.
    pub grandmaster_identity: ClockIdentity,
    /// Number of communication paths to the grandmaster.
    pub steps_removed: u16,
    /// Time source of the grandmaster.
    pub time_source: TimeSource,
}

impl AnnounceMessage {
    /// Wire size in bytes.
    pub const SIZE: usize = PtpHeader::SIZE + 20;

    /// Decode from bytes.
    ///
    /// # Errors
    /// Returns `TooShort` if the body is truncated, or any header error.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        let header = PtpHeader::decode(data)?;
        Self::decode_body(header, data)
    }

    fn decode_body(header: PtpHeader, data: &[u8]) -> Result<Self, PtpParseError> {
        if data.len() < Self::SIZE {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        let body = &data[PtpHeader::SIZE..Self::SIZE];
        let mut clock_quality = [0u8; 4];
        clock_quality.copy_from_slice(&body[4..8]);
        Ok(Self {
            header,
            utc_offset: u16::from_be_bytes([body[0], body[1]]),
            priority1: body[3],
            clock_quality,
            priority2: body[8],
            grandmaster_identity: ClockIdentity::read(&body[9..17]),
            steps_removed: u16::from_be_bytes([body[17], body[18]]),
            time_source: TimeSource::from(body[19]),
        })
    }

    /// Encode to bytes. The header length field is set to [`Self::SIZE`].
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut header = self.header;
        header.message_length = u16::try_from(Self::SIZE).unwrap_or(u16::MAX);
        let mut buf = [0u8; Self::SIZE];
        buf[..PtpHeader::SIZE].copy_from_slice(&header.encode());
        let body = &mut buf[PtpHeader::SIZE..];
        body[0..2].copy_from_slice(&self.utc_offset.to_be_bytes());
        // body[2] reserved
        body[3] = self.priority1;
        body[4..8].copy_from_slice(&self.clock_quality);
        body[8] = self.priority2;
        body[9..17].copy_from_slice(self.grandmaster_identity.bytes());
        body[17..19].copy_from_slice(&self.steps_removed.to_be_bytes());
        body[19] = u8::from(self.time_source);
        buf
    }
}

/// `Delay_Resp` message: header + identity of the requesting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRespMessage {
    /// Common header; the timestamp is the `Delay_Req` receive time.
    pub header: PtpHeader,
    /// Clock identity of the client that sent the `Delay_Req`.
    pub requesting_identity: ClockIdentity,
    /// Port id of the client that sent the `Delay_Req`.
    pub requesting_port_id: u16,
}

impl DelayRespMessage {
    /// Wire size in bytes.
    pub const SIZE: usize = PtpHeader::SIZE + 10;

    /// Decode from bytes.
    ///
    /// # Errors
    /// Returns `TooShort` if the body is truncated, or any header error.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        let header = PtpHeader::decode(data)?;
        Self::decode_body(header, data)
    }

    fn decode_body(header: PtpHeader, data: &[u8]) -> Result<Self, PtpParseError> {
        if data.len() < Self::SIZE {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        Ok(Self {
            header,
            requesting_identity: ClockIdentity::read(&data[44..52]),
            requesting_port_id: u16::from_be_bytes([data[52], data[53]]),
        })
    }

    /// Encode to bytes. The header length field is set to [`Self::SIZE`].
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut header = self.header;
        header.message_length = u16::try_from(Self::SIZE).unwrap_or(u16::MAX);
        let mut buf = [0u8; Self::SIZE];
        buf[..PtpHeader::SIZE].copy_from_slice(&header.encode());
        buf[44..52].copy_from_slice(self.requesting_identity.bytes());
        buf[52..54].copy_from_slice(&self.requesting_port_id.to_be_bytes());
        buf
    }
}

/// A parsed PTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtpMessage {
    /// Sync; the header timestamp is the origin time (precise if one-step).
    Sync(PtpHeader),
    /// Delay request.
    DelayReq(PtpHeader),
    /// Follow-up; the header timestamp is the precise Sync origin time.
    FollowUp(PtpHeader),
    /// Delay response.
    DelayResp(DelayRespMessage),
    /// Announce.
    Announce(AnnounceMessage),
}

impl PtpMessage {
    /// Parse a complete PTP message from a datagram.
    ///
    /// # Errors
    /// Returns a header error, `LengthMismatch` if the header claims more
    /// bytes than the datagram holds, or `TooShort` for a truncated body.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        let header = PtpHeader::decode(data)?;
        if usize::from(header.message_length) > data.len() {
            return Err(PtpParseError::LengthMismatch {
                declared: header.message_length,
                actual: data.len(),
            });
        }
        Ok(match header.message_type {
            PtpMessageType::Sync => Self::Sync(header),
            PtpMessageType::DelayReq => Self::DelayReq(header),
            PtpMessageType::FollowUp => Self::FollowUp(header),
            PtpMessageType::DelayResp => Self::DelayResp(DelayRespMessage::decode_body(header, data)?),
            PtpMessageType::Announce => Self::Announce(AnnounceMessage::decode_body(header, data)?),
        })
    }

    /// Common header of the message.
    #[must_use]
    pub fn header(&self) -> &PtpHeader {
        match self {
            Self::Sync(header) | Self::DelayReq(header) | Self::FollowUp(header) => header,
            Self::DelayResp(msg) => &msg.header,
            Self::Announce(msg) => &msg.header,
        }
    }
}

/// Errors from PTP message parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PtpParseError {
    /// Datagram shorter than its message type requires.
    #[error("packet too short: need {needed} bytes, have {have}")]
    TooShort {
        /// Minimum bytes needed.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },
    /// Not PTP version 2.0 / 2.1.
    #[error("unsupported PTP version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found in the header.
        major: u8,
        /// Minor version found in the header.
        minor: u8,
    },
    /// Message type this client does not handle.
    #[error("unknown PTP message type: 0x{0:02X}")]
    UnknownMessageType(u8),
    /// Header length field exceeds the datagram.
    #[error("header declares {declared} bytes but datagram has {actual}")]
    LengthMismatch {
        /// Length from the header.
        declared: u16,
        /// Datagram length.
        actual: usize,
    },
}
