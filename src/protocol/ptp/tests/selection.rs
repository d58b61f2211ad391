use crate::protocol::ptp::message::{
    AnnounceMessage, ClockIdentity, PtpHeader, PtpMessageType, TimeSource,
};
use crate::protocol::ptp::selection::*;

fn announce(server: u64, priority1: u8) -> AnnounceMessage {
    AnnounceMessage {
        header: PtpHeader::new(
            PtpMessageType::Announce,
            ClockIdentity::from_u64(server),
            0,
        ),
        utc_offset: 37,
        priority1,
        clock_quality: [0; 4],
        priority2: 128,
        grandmaster_identity: ClockIdentity::from_u64(server),
        steps_removed: 0,
        time_source: TimeSource::Gnss,
    }
}

#[test]
fn test_initial_state() {
    let selection = ServerSelection::default();
    assert_eq!(selection.server(), None);
    assert_eq!(selection.priority(), INITIAL_PRIORITY);
}

#[test]
fn test_first_announce_selects_server() {
    let mut selection = ServerSelection::default();
    assert_eq!(
        selection.evaluate(&announce(0xA, 128)),
        SelectionOutcome::Switched {
            previous: None
        }
    );
    assert!(selection.is_selected(&ClockIdentity::from_u64(0xA)));
    assert_eq!(selection.priority(), 128);
}

#[test]
fn test_priority_255_never_selected_initially() {
    let mut selection = ServerSelection::default();
    assert_eq!(
        selection.evaluate(&announce(0xA, 255)),
        SelectionOutcome::Rejected
    );
    assert_eq!(selection.server(), None);
}

#[test]
fn test_better_server_wins() {
    let mut selection = ServerSelection::default();
    selection.evaluate(&announce(0xA, 128));
    assert_eq!(
        selection.evaluate(&announce(0xB, 100)),
        SelectionOutcome::Switched {
            previous: Some(ClockIdentity::from_u64(0xA))
        }
    );
    assert_eq!(selection.server(), Some(ClockIdentity::from_u64(0xB)));
    assert_eq!(selection.priority(), 100);
}

#[test]
fn test_equal_or_worse_server_rejected() {
    let mut selection = ServerSelection::default();
    selection.evaluate(&announce(0xA, 128));
    assert_eq!(
        selection.evaluate(&announce(0xB, 128)),
        SelectionOutcome::Rejected
    );
    assert_eq!(
        selection.evaluate(&announce(0xB, 200)),
        SelectionOutcome::Rejected
    );
    assert_eq!(selection.server(), Some(ClockIdentity::from_u64(0xA)));
}

#[test]
fn test_selected_server_refreshes_priority() {
    let mut selection = ServerSelection::default();
    selection.evaluate(&announce(0xA, 128));
    selection.age();
    selection.age();
    assert_eq!(selection.priority(), 130);

    // Also applies a worse administrative priority.
    assert_eq!(
        selection.evaluate(&announce(0xA, 140)),
        SelectionOutcome::Refreshed { priority: 140 }
    );
    assert_eq!(selection.priority(), 140);
}

#[test]
fn test_aging_lets_backup_take_over() {
    let mut selection = ServerSelection::default();
    selection.evaluate(&announce(0xA, 100));

    // Backup with priority 110 loses until the primary has aged past it.
    for _ in 0..10 {
        selection.age();
        assert_eq!(
            selection.evaluate(&announce(0xB, 110)),
            SelectionOutcome::Rejected
        );
    }
    selection.age();
    assert_eq!(selection.priority(), 111);
    assert!(matches!(
        selection.evaluate(&announce(0xB, 110)),
        SelectionOutcome::Switched { .. }
    ));
}

#[test]
fn test_priority_wraps_from_255_to_0() {
    let mut selection = ServerSelection::default();
    selection.evaluate(&announce(0xA, 254));
    selection.age();
    assert_eq!(selection.priority(), 255);
    selection.age();
    assert_eq!(selection.priority(), 0);

    // A wrapped silent server now beats everyone.
    assert_eq!(
        selection.evaluate(&announce(0xB, 0)),
        SelectionOutcome::Rejected
    );
}

#[test]
fn test_aging_without_selection_wraps_initial_priority() {
    let mut selection = ServerSelection::default();
    selection.age();
    assert_eq!(selection.priority(), 0);
}

#[test]
fn test_all_zero_identity_is_not_preselected() {
    let mut selection = ServerSelection::default();
    assert!(!selection.is_selected(&ClockIdentity::ZERO));

    assert_eq!(
        selection.evaluate(&announce(0, 10)),
        SelectionOutcome::Switched { previous: None }
    );
    assert!(selection.is_selected(&ClockIdentity::ZERO));
    assert_eq!(selection.priority(), 10);
}
