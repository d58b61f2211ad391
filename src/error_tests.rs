use crate::error::*;
use std::error::Error as _;
use std::io;
use std::net::Ipv6Addr;

#[test]
fn test_error_display() {
    let err = PtpClientError::NoInterface {
        requested: Some("eth7".to_string()),
    };
    assert_eq!(
        err.to_string(),
        "no usable network interface (requested: Some(\"eth7\"))"
    );

    let err = PtpClientError::NoInterface { requested: None };
    assert_eq!(err.to_string(), "no usable network interface (requested: None)");
}

#[test]
fn test_transport_error_keeps_source() {
    let err = PtpClientError::Transport {
        port: 319,
        source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    };
    assert_eq!(err.to_string(), "failed to bind PTP socket on port 319: denied");
    assert!(err.source().is_some());
}

#[test]
fn test_multicast_error_names_group() {
    let err = PtpClientError::MulticastJoin {
        group: Ipv6Addr::new(0xff0e, 0, 0, 0, 0, 0, 0, 0x181),
        source: io::Error::other("no route"),
    };
    assert_eq!(
        err.to_string(),
        "failed to join multicast group ff0e::181: no route"
    );
}

#[test]
fn test_multicast_interface_error_names_index() {
    let err = PtpClientError::MulticastInterface {
        index: 3,
        source: io::Error::other("invalid argument"),
    };
    assert_eq!(
        err.to_string(),
        "failed to send multicast on interface 3: invalid argument"
    );
    assert!(err.source().is_some());
}

#[test]
fn test_error_from_io() {
    let io_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "gone");
    let err: PtpClientError = io_err.into();

    assert!(matches!(err, PtpClientError::Io(_)));
}

#[test]
fn test_error_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PtpClientError>();
}
