//! Tokio runtime implementation of the PTP collaborators

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::traits::{Endpoint, HardwareClock, IdentitySource, RandomSource, Timer, Transport};
use crate::error::PtpClientError;
use crate::protocol::ptp::message::ClockIdentity;

/// Current system time in nanoseconds since the Unix epoch
#[must_use]
pub fn system_time_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

// Offset, anchor and drift change together. The writer makes `version`
// odd while updating them; readers retry until they see the same even
// version before and after loading.
#[derive(Debug, Default)]
struct ClockInner {
    version: AtomicU64,
    offset_ns: AtomicI64,
    drift: AtomicI32,
    anchor_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct ClockParams {
    offset_ns: i64,
    drift: i32,
    anchor_ns: u64,
}

impl ClockParams {
    // Extra nanoseconds gained since the speed was last set.
    fn speed_correction(&self, system_ns: u64) -> i128 {
        let elapsed = i128::from(system_ns.saturating_sub(self.anchor_ns));
        (elapsed * i128::from(self.drift)) >> 32
    }
}

impl ClockInner {
    fn load(&self) -> ClockParams {
        loop {
            let before = self.version.load(Ordering::Acquire);
            if before & 1 == 0 {
                let params = ClockParams {
                    offset_ns: self.offset_ns.load(Ordering::Acquire),
                    drift: self.drift.load(Ordering::Acquire),
                    anchor_ns: self.anchor_ns.load(Ordering::Acquire),
                };
                if self.version.load(Ordering::Acquire) == before {
                    return params;
                }
            }
            std::hint::spin_loop();
        }
    }

    fn update(&self, f: impl FnOnce(&Self)) {
        self.version.fetch_add(1, Ordering::AcqRel);
        f(self);
        self.version.fetch_add(1, Ordering::Release);
    }
}

/// Software clock: system time plus a disciplined offset and speed
///
/// Clones share state, so the receive tasks timestamp datagrams on the
/// same clock the protocol task steps. Only the protocol task writes.
#[derive(Debug, Clone, Default)]
pub struct SoftwareClock {
    inner: Arc<ClockInner>,
}

impl SoftwareClock {
    /// Create a clock that starts out equal to system time
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current disciplined time in nanoseconds since epoch
    #[must_use]
    pub fn now(&self) -> u64 {
        self.read_at(system_time_ns())
    }

    /// Disciplined time for a given system time reading
    #[must_use]
    pub fn read_at(&self, system_ns: u64) -> u64 {
        let params = self.inner.load();
        let total = i128::from(system_ns)
            + i128::from(params.offset_ns)
            + params.speed_correction(system_ns);
        u64::try_from(total.max(0)).unwrap_or(u64::MAX)
    }

    /// Accumulated offset in nanoseconds
    #[must_use]
    pub fn offset_ns(&self) -> i64 {
        self.inner.load().offset_ns
    }

    /// Current speed correction (2^32 scale)
    #[must_use]
    pub fn drift(&self) -> i32 {
        self.inner.load().drift
    }
}

impl HardwareClock for SoftwareClock {
    fn read(&self) -> u64 {
        self.now()
    }

    fn step(&mut self, offset_ns: i64) {
        self.inner.update(|inner| {
            inner.offset_ns.fetch_add(offset_ns, Ordering::AcqRel);
        });
    }

    fn adjust_speed(&mut self, drift: i32) {
        let now = system_time_ns();
        // Fold what the old speed gained so far into the offset.
        let gained = i64::try_from(self.inner.load().speed_correction(now)).unwrap_or(0);
        self.inner.update(|inner| {
            inner.offset_ns.fetch_add(gained, Ordering::AcqRel);
            inner.anchor_ns.store(now, Ordering::Release);
            inner.drift.store(drift, Ordering::Release);
        });
    }
}

/// UDP transport over the event and general sockets
///
/// Sends on non-blocking clones of the sockets the receive tasks read
/// from, so a send never waits on the reactor.
#[derive(Debug)]
pub struct UdpTransport {
    event: std::net::UdpSocket,
    general: std::net::UdpSocket,
    event_destination: SocketAddr,
    general_destination: SocketAddr,
    clock: SoftwareClock,
    software_timestamps: bool,
}

impl UdpTransport {
    /// Create a transport sending to `destination` (event port) and
    /// `general_port` on the same address
    #[must_use]
    pub fn new(
        event: std::net::UdpSocket,
        general: std::net::UdpSocket,
        destination: SocketAddr,
        general_port: u16,
        clock: SoftwareClock,
        software_timestamps: bool,
    ) -> Self {
        Self {
            event,
            general,
            event_destination: destination,
            general_destination: SocketAddr::new(destination.ip(), general_port),
            clock,
            software_timestamps,
        }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, endpoint: Endpoint, data: &[u8]) -> io::Result<Option<u64>> {
        let (socket, destination) = match endpoint {
            Endpoint::Event => (&self.event, self.event_destination),
            Endpoint::General => (&self.general, self.general_destination),
        };
        let sent_at = self.clock.now();
        socket.send_to(data, destination)?;
        Ok(self.software_timestamps.then_some(sent_at))
    }
}

/// One-shot deadline polled by the protocol task
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    /// Pending expiry, if armed
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Timer for DeadlineTimer {
    fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Wait until `deadline`, or forever if there is none
pub async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Random source backed by a seeded [`StdRng`]
#[derive(Debug)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seed from the operating system
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for reproducible runs
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for StdRandom {
    fn random_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

/// Clock identity derived from the host name
///
/// The first eight bytes of the SHA-256 of the host name, so the identity
/// is stable across restarts. Falls back to a random identity if the host
/// name is unavailable.
#[derive(Debug, Clone, Default)]
pub struct HostIdentity {
    hostname: Option<String>,
}

impl HostIdentity {
    /// Use the system host name
    #[must_use]
    pub fn new() -> Self {
        Self {
            hostname: hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().into_owned()),
        }
    }

    /// Use an explicit host name
    #[must_use]
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
        }
    }
}

impl IdentitySource for HostIdentity {
    fn derive_unique_id(&self) -> ClockIdentity {
        let Some(hostname) = self.hostname.as_deref() else {
            tracing::warn!("PTP client: host name unavailable, using random clock identity");
            let mut bytes = [0u8; 8];
            rand::thread_rng().fill_bytes(&mut bytes);
            return ClockIdentity(bytes);
        };
        let digest = Sha256::digest(hostname.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        ClockIdentity(bytes)
    }
}

/// Bind a non-blocking PTP socket on `bind_addr:port`
///
/// # Errors
///
/// Returns `PtpClientError::Transport` if the socket cannot be bound.
pub fn bind_ptp_socket(bind_addr: IpAddr, port: u16) -> Result<std::net::UdpSocket, PtpClientError> {
    let socket = std::net::UdpSocket::bind(SocketAddr::new(bind_addr, port))
        .and_then(|socket| socket.set_nonblocking(true).map(|()| socket))
        .map_err(|source| PtpClientError::Transport { port, source })?;
    Ok(socket)
}

/// Join the IPv6 multicast `group` on interface `index`
///
/// # Errors
///
/// Returns `PtpClientError::MulticastJoin` if the join fails.
pub fn join_multicast(
    socket: &std::net::UdpSocket,
    group: Ipv6Addr,
    index: u32,
) -> Result<(), PtpClientError> {
    socket
        .join_multicast_v6(&group, index)
        .map_err(|source| PtpClientError::MulticastJoin { group, source })
}

/// Send multicast from `socket` on interface `index`
///
/// Without this the kernel picks its default multicast route, which need
/// not be the interface the group was joined on.
///
/// # Errors
///
/// Returns `PtpClientError::MulticastInterface` if the option is rejected.
pub fn set_multicast_interface(
    socket: &std::net::UdpSocket,
    index: u32,
) -> Result<(), PtpClientError> {
    socket2::SockRef::from(socket)
        .set_multicast_if_v6(index)
        .map_err(|source| PtpClientError::MulticastInterface { index, source })
}

/// Split a bound socket into a tokio receiver and a std sender
///
/// # Errors
///
/// Returns the I/O error if the socket cannot be cloned or registered.
pub fn split_socket(socket: std::net::UdpSocket) -> io::Result<(UdpSocket, std::net::UdpSocket)> {
    let sender = socket.try_clone()?;
    Ok((UdpSocket::from_std(socket)?, sender))
}

/// Whether a UDP receive error is transient and should be retried
///
/// On Windows, `WSAECONNRESET` (10054) is returned by `recv_from` after a
/// previous `send_to` triggered an ICMP "port unreachable".
#[must_use]
pub fn is_transient_udp_error(e: &io::Error) -> bool {
    e.raw_os_error() == Some(10054) || e.kind() == io::ErrorKind::ConnectionReset
}
