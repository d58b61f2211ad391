//! Tokio driver for the PTP client.
//!
//! One receive task per socket timestamps datagrams and queues them; a
//! single protocol task owns the [`PtpClient`], drains the queue in order
//! and fires the retry deadline.

use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::client::{PtpClient, PtpEvent};
use super::config::{PTP_GENERAL_PORT, PtpClientConfig};
use super::message::ClockIdentity;
use super::status::StatusHandle;
use crate::error::PtpClientError;
use crate::net::{
    DeadlineTimer, Endpoint, HostIdentity, IdentitySource, InterfaceInfo, SoftwareClock,
    StdRandom, Timer, UdpTransport, bind_ptp_socket, discover_interface, is_transient_udp_error,
    join_multicast, set_multicast_interface, split_socket, wait_deadline,
};

/// PTP client wired to the tokio host collaborators.
pub type HostPtpClient = PtpClient<UdpTransport, SoftwareClock, DeadlineTimer, StdRandom>;

/// Handle to a running PTP client.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown)
/// leaves the tasks running until the runtime stops.
#[derive(Debug)]
pub struct PtpClientHandle {
    status: StatusHandle,
    clock: SoftwareClock,
    interface: Option<InterfaceInfo>,
    event_addr: SocketAddr,
    general_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    receivers: Vec<JoinHandle<()>>,
}

impl PtpClientHandle {
    /// Bind the sockets and start the client.
    ///
    /// # Errors
    ///
    /// Returns `PtpClientError` if no interface is usable, a socket cannot
    /// be bound, or the multicast group cannot be joined.
    pub async fn start(config: PtpClientConfig) -> Result<Self, PtpClientError> {
        let interface = match config.multicast_group {
            Some(_) => Some(discover_interface(config.interface.as_deref())?),
            None => None,
        };

        let event = bind_ptp_socket(config.bind_addr, config.event_port)?;
        let general = bind_ptp_socket(config.bind_addr, config.general_port)?;
        if let (Some(group), Some(info), IpAddr::V6(_)) =
            (config.multicast_group, &interface, config.bind_addr)
        {
            join_multicast(&event, group, info.index)?;
            join_multicast(&general, group, info.index)?;
            set_multicast_interface(&event, info.index)?;
            set_multicast_interface(&general, info.index)?;
        }

        let (event_rx, event_tx) = split_socket(event)?;
        let (general_rx, general_tx) = split_socket(general)?;
        let event_addr = event_rx.local_addr()?;
        let general_addr = general_rx.local_addr()?;

        let local_identity = config
            .clock_identity
            .unwrap_or_else(|| HostIdentity::new().derive_unique_id());
        let clock = SoftwareClock::new();
        let destination = config.delay_req_destination();
        let transport = UdpTransport::new(
            event_tx,
            general_tx,
            destination,
            PTP_GENERAL_PORT,
            clock.clone(),
            config.software_timestamps,
        );

        let client = PtpClient::new(
            local_identity,
            transport,
            clock.clone(),
            DeadlineTimer::default(),
            StdRandom::new(),
            &config,
        );
        let status = client.status();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let receivers = vec![
            tokio::spawn(receive_loop(
                event_rx,
                Endpoint::Event,
                clock.clone(),
                config.software_timestamps,
                config.recv_buf_size,
                events_tx.clone(),
            )),
            tokio::spawn(receive_loop(
                general_rx,
                Endpoint::General,
                clock.clone(),
                config.software_timestamps,
                config.recv_buf_size,
                events_tx,
            )),
        ];

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(client, events_rx, shutdown_rx));

        tracing::info!(
            identity = %local_identity,
            %event_addr,
            %general_addr,
            %destination,
            interface = interface.as_ref().map_or("-", |i| i.name.as_str()),
            "PTP client started"
        );

        Ok(Self {
            status,
            clock,
            interface,
            event_addr,
            general_addr,
            shutdown_tx,
            task,
            receivers,
        })
    }

    /// Read-only status of the running client.
    #[must_use]
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// The disciplined clock.
    #[must_use]
    pub fn clock(&self) -> &SoftwareClock {
        &self.clock
    }

    /// Local clock identity.
    #[must_use]
    pub fn local_identity(&self) -> ClockIdentity {
        self.status.local_identity()
    }

    /// Interface the multicast group was joined on, if any.
    #[must_use]
    pub fn interface(&self) -> Option<&InterfaceInfo> {
        self.interface.as_ref()
    }

    /// Local address of the event socket.
    #[must_use]
    pub fn event_addr(&self) -> SocketAddr {
        self.event_addr
    }

    /// Local address of the general socket.
    #[must_use]
    pub fn general_addr(&self) -> SocketAddr {
        self.general_addr
    }

    /// Stop the client and wait for the protocol task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for receiver in &self.receivers {
            receiver.abort();
        }
        if let Err(e) = self.task.await {
            tracing::warn!("PTP client task ended abnormally: {e}");
        }
    }
}

/// Protocol task: the single consumer of all events.
async fn run(
    mut client: HostPtpClient,
    mut events: mpsc::UnboundedReceiver<PtpEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let deadline = client.timer().deadline();
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!("PTP client: event queue closed");
                    break;
                };
                let outcome = client.handle_event(&event);
                tracing::trace!(?outcome, "PTP client: handled datagram");
            }

            () = wait_deadline(deadline) => {
                client.timer_mut().cancel();
                client.handle_event(&PtpEvent::TimerExpired);
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("PTP client shutting down");
                    break;
                }
            }
        }
    }
}

/// Receive task: timestamp and queue every datagram of one socket.
async fn receive_loop(
    socket: UdpSocket,
    endpoint: Endpoint,
    clock: SoftwareClock,
    software_timestamps: bool,
    buf_size: usize,
    events: mpsc::UnboundedSender<PtpEvent>,
) {
    let mut buf = vec![0u8; buf_size];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                let rx_timestamp = software_timestamps.then(|| clock.now());
                tracing::trace!(%endpoint, %src, len, "PTP client: received datagram");
                let event = PtpEvent::Datagram {
                    endpoint,
                    data: buf[..len].to_vec(),
                    rx_timestamp,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(e) if is_transient_udp_error(&e) => {
                tracing::debug!("PTP client: transient {endpoint} socket error: {e}");
            }
            Err(e) => {
                tracing::error!("PTP client: {endpoint} socket receive failed: {e}");
                break;
            }
        }
    }
}
