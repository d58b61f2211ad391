//! PTP client configuration

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use super::message::ClockIdentity;

/// Standard PTP event port (Sync, `Delay_Req`).
pub const PTP_EVENT_PORT: u16 = 319;

/// Standard PTP general port (`Follow_Up`, `Delay_Resp`, Announce).
pub const PTP_GENERAL_PORT: u16 = 320;

/// Primary PTP IPv6 multicast group (`ff0e::181`).
pub const PTP_PRIMARY_MULTICAST: Ipv6Addr = Ipv6Addr::new(0xff0e, 0, 0, 0, 0, 0, 0, 0x0181);

/// Configuration for the PTP client
#[derive(Debug, Clone)]
pub struct PtpClientConfig {
    /// Time between two delay measurements (jitter is added on top)
    pub delay_req_interval: Duration,

    /// How long to wait for a `Delay_Resp` or `Follow_Up`
    pub delay_req_timeout: Duration,

    /// Local address the sockets bind to
    pub bind_addr: IpAddr,

    /// Local event port (0 = auto-assign)
    pub event_port: u16,

    /// Local general port (0 = auto-assign)
    pub general_port: u16,

    /// Multicast group to join; `None` runs in unicast mode without
    /// interface discovery
    pub multicast_group: Option<Ipv6Addr>,

    /// Where `Delay_Req` messages go (default: multicast group, event port)
    pub server_addr: Option<SocketAddr>,

    /// Interface to use (None = first interface with an IPv6 address)
    pub interface: Option<String>,

    /// Fixed local clock identity (None = derived from the host)
    pub clock_identity: Option<ClockIdentity>,

    /// Forward drift estimates to the clock's speed adjustment
    pub speed_adjustment: bool,

    /// Capture send/receive timestamps in software
    pub software_timestamps: bool,

    /// Maximum receive buffer size
    pub recv_buf_size: usize,
}

impl Default for PtpClientConfig {
    fn default() -> Self {
        Self {
            delay_req_interval: Duration::from_secs(10),
            delay_req_timeout: Duration::from_millis(500),
            bind_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            event_port: PTP_EVENT_PORT,
            general_port: PTP_GENERAL_PORT,
            multicast_group: Some(PTP_PRIMARY_MULTICAST),
            server_addr: None,
            interface: None,
            clock_identity: None,
            speed_adjustment: true,
            software_timestamps: true,
            recv_buf_size: 128,
        }
    }
}

impl PtpClientConfig {
    /// Unicast configuration talking to a single known server
    ///
    /// Binds both sockets to auto-assigned ports on `bind_addr` and skips
    /// interface discovery and the multicast join.
    #[must_use]
    pub fn unicast(bind_addr: IpAddr, server_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            event_port: 0,
            general_port: 0,
            multicast_group: None,
            server_addr: Some(server_addr),
            ..Default::default()
        }
    }

    /// Set the delay request interval
    #[must_use]
    pub fn delay_req_interval(mut self, interval: Duration) -> Self {
        self.delay_req_interval = interval;
        self
    }

    /// Set the response timeout
    #[must_use]
    pub fn delay_req_timeout(mut self, timeout: Duration) -> Self {
        self.delay_req_timeout = timeout;
        self
    }

    /// Use a specific network interface
    #[must_use]
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Use a fixed clock identity
    #[must_use]
    pub fn clock_identity(mut self, identity: ClockIdentity) -> Self {
        self.clock_identity = Some(identity);
        self
    }

    /// Enable or disable clock speed adjustment
    #[must_use]
    pub fn speed_adjustment(mut self, enabled: bool) -> Self {
        self.speed_adjustment = enabled;
        self
    }

    /// Enable or disable software timestamp capture
    #[must_use]
    pub fn software_timestamps(mut self, enabled: bool) -> Self {
        self.software_timestamps = enabled;
        self
    }

    /// Destination of `Delay_Req` messages
    #[must_use]
    pub fn delay_req_destination(&self) -> SocketAddr {
        self.server_addr.unwrap_or_else(|| {
            SocketAddr::new(
                IpAddr::V6(self.multicast_group.unwrap_or(PTP_PRIMARY_MULTICAST)),
                PTP_EVENT_PORT,
            )
        })
    }
}
