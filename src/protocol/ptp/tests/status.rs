use std::sync::Arc;

use crate::net::Endpoint;
use crate::protocol::ptp::client::SyncPhase;
use crate::protocol::ptp::config::PtpClientConfig;
use crate::protocol::ptp::message::ClockIdentity;
use crate::protocol::ptp::status::*;
use crate::testing::{MockPtpServer, mock_client};

const LOCAL_ID: u64 = 0x0102_0304_0506_0708;

fn handle() -> (Arc<PtpStatus>, StatusHandle) {
    let status = Arc::new(PtpStatus::new(ClockIdentity::from_u64(LOCAL_ID)));
    let handle = StatusHandle::new(Arc::clone(&status));
    (status, handle)
}

// ===== Published fields =====

#[test]
fn test_initial_status() {
    let (_, handle) = handle();
    assert_eq!(handle.local_identity(), ClockIdentity::from_u64(LOCAL_ID));
    assert_eq!(handle.server_identity(), None);
    assert_eq!(handle.server_priority(), 255);
    assert_eq!(handle.utc_offset(), 0);
    assert_eq!(handle.rtt_ns(), 0);
    assert_eq!(handle.drift(), 0);
    assert_eq!(handle.phase(), SyncPhase::Idle);
    assert_eq!(handle.corrections(), 0);
}

#[test]
fn test_counters() {
    let (status, handle) = handle();
    status.record_correction();
    status.record_correction();
    status.record_delay_exchange();
    status.record_server_switch();
    status.record_send_failure();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.corrections, 2);
    assert_eq!(snapshot.delay_exchanges, 1);
    assert_eq!(snapshot.server_switches, 1);
    assert_eq!(snapshot.send_failures, 1);
}

#[test]
fn test_clones_share_status() {
    let (status, handle) = handle();
    let other = handle.clone();
    status.record_delay_exchange();
    assert_eq!(other.delay_exchanges(), 1);
}

#[test]
fn test_phase_from_u8() {
    assert_eq!(SyncPhase::from_u8(SyncPhase::WaitFollowUp as u8), SyncPhase::WaitFollowUp);
    assert_eq!(SyncPhase::from_u8(SyncPhase::WaitDelayResp as u8), SyncPhase::WaitDelayResp);
    assert_eq!(SyncPhase::from_u8(0), SyncPhase::Idle);
    assert_eq!(SyncPhase::from_u8(9), SyncPhase::Idle);
}

// ===== Report formatting =====

#[test]
fn test_format_drift_percent() {
    assert_eq!(format_drift_percent(0), "0.0000000");
    // 1 ppm
    assert_eq!(format_drift_percent(4_294), "0.0000999");
    // Arithmetic shift rounds toward negative infinity.
    assert_eq!(format_drift_percent(-4_294), "-0.0001000");
    // Largest accepted estimate, just under 1%.
    assert_eq!(format_drift_percent(42_949_672), "0.9999999");
}

#[test]
fn test_format_clock_time() {
    assert_eq!(format_clock_time(0), "1970-1-1 00:00:00.000000000");
    assert_eq!(
        format_clock_time(1_000_000_000 * 1_000_000_000),
        "2001-9-9 01:46:40.000000000"
    );
    assert_eq!(
        format_clock_time(1_709_210_096 * 1_000_000_000 + 123_456_789),
        "2024-2-29 12:34:56.123456789"
    );
}

#[test]
fn test_format_clock_time_clamps_far_future() {
    assert_eq!(format_clock_time(u64::MAX), "2262-4-11 23:47:16.854775807");
}

#[test]
fn test_snapshot_report() {
    let mut client = mock_client(
        ClockIdentity::from_u64(LOCAL_ID),
        0,
        0,
        &PtpClientConfig::default(),
    );
    let server = MockPtpServer::new(0xAAAA);
    client.handle_datagram(Endpoint::General, &server.announce(0, 128, 37), Some(1));

    let report = client.status().snapshot().to_string();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Local Clock ID:           010203.0405.060708",
            "Selected Server Clock ID: 000000.0000.00aaaa",
            "Current offset to UTC time: 37 secs",
            "Estimated network delay (whole round trip): 0 ns",
            "Estimated clock drift: 0.0000000%",
        ]
    );
}

#[test]
fn test_snapshot_serializes_identities_as_strings() {
    let (status, handle) = handle();
    status.record_server_switch();

    let json = serde_json::to_value(handle.snapshot()).unwrap();
    assert_eq!(json["local_identity"], "010203.0405.060708");
    assert!(json["server_identity"].is_null());
    assert_eq!(json["server_priority"], 255);
    assert_eq!(json["phase"], "Idle");
    assert_eq!(json["server_switches"], 1);
}
