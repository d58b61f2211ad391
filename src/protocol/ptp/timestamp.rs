//! PTP wire timestamp representation and conversions.
//!
//! IEEE 1588 carries timestamps as 80 bits on the wire: a 48-bit
//! big-endian seconds field followed by a 32-bit nanoseconds field.
//! There is no native 48-bit integer, so the seconds are composed from
//! and decomposed into six explicit bytes.

/// IEEE 1588 PTP timestamp: 48-bit seconds + 32-bit nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PtpTimestamp {
    /// Seconds since the PTP epoch (only the lower 48 bits go on the wire).
    pub seconds: u64,
    /// Nanoseconds within the current second.
    pub nanoseconds: u32,
}

impl PtpTimestamp {
    /// Wire size in bytes.
    pub const SIZE: usize = 10;

    /// Nanoseconds per second.
    pub const NANOS_PER_SEC: u32 = 1_000_000_000;

    /// Maximum seconds representable in 48 bits.
    pub const MAX_SECONDS_48BIT: u64 = (1u64 << 48) - 1;

    /// Zero timestamp.
    pub const ZERO: Self = Self {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Create a new timestamp.
    #[must_use]
    pub const fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Nanoseconds since epoch: `seconds * 1e9 + nanoseconds`.
    ///
    /// Computed in unsigned 64-bit arithmetic, which wraps for seconds
    /// beyond roughly year 2554.
    #[must_use]
    pub const fn to_nanos(&self) -> u64 {
        self.seconds
            .wrapping_mul(Self::NANOS_PER_SEC as u64)
            .wrapping_add(self.nanoseconds as u64)
    }

    /// Split nanoseconds since epoch into seconds and nanoseconds.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "remainder of a division by 1e9 always fits in u32"
    )]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            seconds: nanos / Self::NANOS_PER_SEC as u64,
            nanoseconds: (nanos % Self::NANOS_PER_SEC as u64) as u32,
        }
    }

    /// Encode as IEEE 1588 wire format: 6-byte seconds (BE) + 4-byte nanoseconds (BE).
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        let sec_bytes = self.seconds.to_be_bytes();
        // 48-bit seconds: lower 6 bytes of the u64
        buf[0..6].copy_from_slice(&sec_bytes[2..8]);
        buf[6..10].copy_from_slice(&self.nanoseconds.to_be_bytes());
        buf
    }

    /// Decode from IEEE 1588 wire format.
    ///
    /// Returns `None` if the slice is shorter than 10 bytes.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let seconds = u64::from(data[0]) << 40
            | u64::from(data[1]) << 32
            | u64::from(data[2]) << 24
            | u64::from(data[3]) << 16
            | u64::from(data[4]) << 8
            | u64::from(data[5]);
        let nanoseconds = u32::from_be_bytes([data[6], data[7], data[8], data[9]]);
        Some(Self {
            seconds,
            nanoseconds,
        })
    }
}

impl std::fmt::Display for PtpTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

impl From<PtpTimestamp> for u64 {
    fn from(ts: PtpTimestamp) -> Self {
        ts.to_nanos()
    }
}
