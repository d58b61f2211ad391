use crate::net::traits::Endpoint;

#[test]
fn test_endpoint_display() {
    assert_eq!(Endpoint::Event.to_string(), "event");
    assert_eq!(Endpoint::General.to_string(), "general");
}

#[test]
fn test_discover_unknown_interface() {
    let err = crate::net::discover_interface(Some("no-such-if0")).unwrap_err();
    assert!(matches!(
        err,
        crate::error::PtpClientError::NoInterface { requested: Some(ref name) } if name == "no-such-if0"
    ));
}

#[cfg(feature = "tokio-runtime")]
mod tokio_tests {
    use std::time::Duration;

    use crate::net::tokio_impl::{
        DeadlineTimer, HostIdentity, SoftwareClock, StdRandom, UdpTransport, bind_ptp_socket,
        is_transient_udp_error, set_multicast_interface, split_socket, system_time_ns,
    };
    use crate::net::traits::{Endpoint, HardwareClock, IdentitySource, RandomSource, Timer, Transport};
    use crate::protocol::ptp::message::ClockIdentity;

    const LOCALHOST: std::net::IpAddr = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    // ===== SoftwareClock =====

    #[test]
    fn test_software_clock_tracks_system_time() {
        let clock = SoftwareClock::new();
        let before = system_time_ns();
        let now = clock.now();
        let after = system_time_ns();
        assert!(now >= before && now <= after);
    }

    #[test]
    fn test_software_clock_step_shifts_reading() {
        let mut clock = SoftwareClock::new();
        clock.step(5_000_000_000);
        assert_eq!(clock.offset_ns(), 5_000_000_000);
        assert_eq!(clock.read_at(1_000), 5_000_001_000);

        clock.step(-2_000_000_000);
        assert_eq!(clock.read_at(1_000), 3_000_001_000);
    }

    #[test]
    fn test_software_clock_shares_state_between_clones() {
        let mut clock = SoftwareClock::new();
        let reader = clock.clone();
        clock.step(1_000);
        assert_eq!(reader.offset_ns(), 1_000);
    }

    #[test]
    fn test_software_clock_negative_reading_saturates() {
        let mut clock = SoftwareClock::new();
        clock.step(-10_000);
        assert_eq!(clock.read_at(1_000), 0);
    }

    #[test]
    fn test_software_clock_speed_adjustment() {
        let mut clock = SoftwareClock::new();
        // 1/4096 fast
        clock.adjust_speed(1 << 20);
        assert_eq!(clock.drift(), 1 << 20);

        let now = system_time_ns();
        let reading = clock.read_at(now + 4_096_000_000);
        let expected = now + 4_096_000_000 + 1_000_000;
        // The anchor was taken slightly before `now`.
        assert!(reading >= expected && reading < expected + 1_000);
    }

    #[test]
    fn test_software_clock_speed_change_keeps_gain() {
        let mut clock = SoftwareClock::new();
        clock.adjust_speed(1 << 20);
        std::thread::sleep(Duration::from_millis(5));
        let before = clock.now();
        clock.adjust_speed(0);
        // Time must not jump back when the speed correction is removed.
        assert!(clock.now() >= before);
        assert!(clock.offset_ns() > 0);
    }

    #[test]
    fn test_software_clock_reader_never_sees_gain_twice() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        // A quarter fast: any gain counted twice shows up as microseconds.
        const DRIFT: i32 = 1 << 30;
        const FOLDS: u64 = 500;

        let mut clock = SoftwareClock::new();
        clock.adjust_speed(DRIFT);
        let read_point = system_time_ns() + 3_600_000_000_000;
        let expected = clock.read_at(read_point);

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let clock = clock.clone();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut worst = 0u64;
                while !done.load(Ordering::Acquire) {
                    let reading = clock.read_at(read_point);
                    assert!(reading <= expected, "gain counted twice: {reading} > {expected}");
                    worst = worst.max(expected - reading);
                }
                worst
            })
        };

        for _ in 0..FOLDS {
            // Same speed: folding must leave future readings unchanged
            // apart from truncation.
            clock.adjust_speed(DRIFT);
            std::thread::sleep(Duration::from_micros(20));
        }
        done.store(true, Ordering::Release);

        let worst = reader.join().unwrap();
        assert!(worst <= FOLDS + 1, "reading drifted by {worst} ns");
    }

    // ===== DeadlineTimer =====

    #[tokio::test(start_paused = true)]
    async fn test_deadline_timer_arm_and_cancel() {
        let mut timer = DeadlineTimer::default();
        assert!(timer.deadline().is_none());

        let start = tokio::time::Instant::now();
        timer.arm(Duration::from_millis(500));
        assert_eq!(timer.deadline(), Some(start + Duration::from_millis(500)));

        // Re-arming replaces the previous deadline.
        timer.arm(Duration::from_secs(10));
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(10)));

        timer.cancel();
        assert!(timer.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_deadline_fires() {
        let mut timer = DeadlineTimer::default();
        timer.arm(Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        crate::net::tokio_impl::wait_deadline(timer.deadline()).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_deadline_without_deadline_pends() {
        let result = tokio::time::timeout(
            Duration::from_secs(3600),
            crate::net::tokio_impl::wait_deadline(None),
        )
        .await;
        assert!(result.is_err());
    }

    // ===== StdRandom / HostIdentity =====

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = StdRandom::seeded(42);
        let mut b = StdRandom::seeded(42);
        for _ in 0..8 {
            assert_eq!(a.random_u32(), b.random_u32());
        }
    }

    #[test]
    fn test_host_identity_is_stable() {
        let a = HostIdentity::with_hostname("ptp-host").derive_unique_id();
        let b = HostIdentity::with_hostname("ptp-host").derive_unique_id();
        let c = HostIdentity::with_hostname("other-host").derive_unique_id();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ClockIdentity::ZERO);
    }

    #[test]
    fn test_transient_udp_errors() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(is_transient_udp_error(&reset));
        assert!(is_transient_udp_error(&std::io::Error::from_raw_os_error(10054)));
        let refused = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!is_transient_udp_error(&refused));
    }

    // ===== UdpTransport =====

    #[tokio::test]
    async fn test_udp_transport_sends_with_timestamp() {
        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let event = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let general = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let event_addr = event.local_addr().unwrap();
        let server_addr = server.local_addr().unwrap();

        let clock = SoftwareClock::new();
        let mut transport =
            UdpTransport::new(event, general, server_addr, server_addr.port(), clock, true);

        let before = system_time_ns();
        let sent = transport.send(Endpoint::Event, b"hello").unwrap();
        assert!(sent.unwrap() >= before);

        let mut buf = [0u8; 16];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, event_addr);
    }

    #[tokio::test]
    async fn test_udp_transport_without_software_timestamps() {
        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let event = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let general = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut transport = UdpTransport::new(
            event,
            general,
            server_addr,
            server_addr.port(),
            SoftwareClock::new(),
            false,
        );
        assert_eq!(transport.send(Endpoint::Event, b"x").unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_socket_shares_port() {
        let socket = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let addr = socket.local_addr().unwrap();
        let (receiver, sender) = split_socket(socket).unwrap();
        assert_eq!(receiver.local_addr().unwrap(), addr);
        assert_eq!(sender.local_addr().unwrap(), addr);

        sender.send_to(b"loop", addr).unwrap();
        let mut buf = [0u8; 8];
        let (len, from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"loop");
        assert_eq!(from, addr);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_multicast_sends_leave_on_chosen_interface() {
        let Ok(socket) = bind_ptp_socket(std::net::IpAddr::V6(std::net::Ipv6Addr::LOCALHOST), 0)
        else {
            // No IPv6 on this host.
            return;
        };
        let index = nix::net::if_::if_nametoindex("lo").unwrap();
        set_multicast_interface(&socket, index).unwrap();
        assert_eq!(socket2::SockRef::from(&socket).multicast_if_v6().unwrap(), index);
    }

    #[test]
    fn test_multicast_interface_rejected_on_ipv4_socket() {
        let socket = bind_ptp_socket(LOCALHOST, 0).unwrap();
        match set_multicast_interface(&socket, 1) {
            Err(crate::error::PtpClientError::MulticastInterface { index, .. }) => {
                assert_eq!(index, 1);
            }
            other => panic!("expected MulticastInterface error, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_error_reports_port() {
        let first = bind_ptp_socket(LOCALHOST, 0).unwrap();
        let port = first.local_addr().unwrap().port();
        match bind_ptp_socket(LOCALHOST, port) {
            Err(crate::error::PtpClientError::Transport { port: p, .. }) => assert_eq!(p, port),
            other => panic!("expected Transport error, got {other:?}"),
        }
    }
}
