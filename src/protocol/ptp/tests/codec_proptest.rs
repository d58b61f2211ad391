use proptest::prelude::*;

use crate::protocol::ptp::message::{ClockIdentity, PtpHeader, PtpMessage, PtpMessageType};
use crate::protocol::ptp::timestamp::PtpTimestamp;

fn message_type() -> impl Strategy<Value = PtpMessageType> {
    prop_oneof![
        Just(PtpMessageType::Sync),
        Just(PtpMessageType::DelayReq),
        Just(PtpMessageType::FollowUp),
    ]
}

proptest! {
    #[test]
    fn test_message_decode_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        // Should not panic, return either Ok or Err
        let _ = PtpMessage::decode(&bytes);
    }

    #[test]
    fn test_header_encode_decode_roundtrip(
        message_type in message_type(),
        identity in any::<u64>(),
        sequence_id in any::<u16>(),
        flags in any::<u16>(),
        seconds in 0..=PtpTimestamp::MAX_SECONDS_48BIT,
        nanoseconds in 0u32..1_000_000_000,
    ) {
        let mut header = PtpHeader::new(message_type, ClockIdentity::from_u64(identity), sequence_id);
        header.flags = flags;
        header.timestamp = PtpTimestamp::new(seconds, nanoseconds);

        let decoded = PtpHeader::decode(&header.encode()).expect("Decode failed");
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn test_timestamp_composes_48bit_seconds(
        seconds in 0..=PtpTimestamp::MAX_SECONDS_48BIT,
        nanoseconds in 0u32..1_000_000_000,
    ) {
        let ts = PtpTimestamp::new(seconds, nanoseconds);
        let bytes = ts.encode();
        let mut wide = [0u8; 8];
        wide[2..].copy_from_slice(&bytes[..6]);
        prop_assert_eq!(u64::from_be_bytes(wide), seconds);
        prop_assert_eq!(PtpTimestamp::decode(&bytes), Some(ts));
        prop_assert_eq!(
            ts.to_nanos(),
            seconds.wrapping_mul(1_000_000_000).wrapping_add(u64::from(nanoseconds))
        );
    }

    #[test]
    fn test_identity_u64_conversion(value in any::<u64>()) {
        prop_assert_eq!(ClockIdentity::from_u64(value).to_u64(), value);
    }
}
